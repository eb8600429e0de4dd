use std::sync::Arc;

use haven_store::credentials::API_KEY_STORAGE;
use haven_store::engine::MemStore;
use haven_store::model::{FileContent, NewFile};
use haven_store::sdk::{self, Haven};
use haven_store::server::gateway::{self, Offline};
use haven_store::server::ApiRequest;
use haven_store::{now_millis, Error, MetaStore};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use tempfile::tempdir;

fn body(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_full_request_scenario() {
    let store = Arc::new(MemStore::in_memory());
    store.set_meta(API_KEY_STORAGE, "abc123").await.unwrap();
    let haven = Haven::from_store(store);

    haven.install(Arc::new(Offline)).unwrap();
    assert!(matches!(haven.install(Arc::new(Offline)), Err(Error::AlreadyInstalled)));

    let before = now_millis();
    let create = ApiRequest::new(Method::POST, "http://localhost:3000/api/files")
        .unwrap()
        .api_key("abc123")
        .unwrap()
        .json(&json!({"name": "a.txt", "mediaType": "text/plain", "sizeBytes": 10, "content": "..."}))
        .unwrap();
    let resp = gateway::fetch(create).await.unwrap();
    assert_eq!(resp.status, StatusCode::CREATED);
    let created = body(&resp.body)["data"].clone();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    let modified = created["lastModified"].as_i64().unwrap();
    assert!(modified >= before && modified <= now_millis());

    let get = |key: &str| {
        ApiRequest::new(Method::GET, &format!("/api/files/{}", id))
            .unwrap()
            .api_key(key)
            .unwrap()
    };
    let resp = gateway::fetch(get("abc123")).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(body(&resp.body)["data"], created);

    let resp = gateway::fetch(get("wrong")).await.unwrap();
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(body(&resp.body), json!({"success": false, "error": "Invalid API key"}));

    let delete = || {
        ApiRequest::new(Method::DELETE, &format!("/api/files/{}", id))
            .unwrap()
            .api_key("abc123")
            .unwrap()
    };
    let resp = gateway::fetch(delete()).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(body(&resp.body), json!({"success": true, "data": {"deleted": true}}));

    let resp = gateway::fetch(delete()).await.unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // Non-API traffic reaches the fallback transport.
    let page = ApiRequest::new(Method::GET, "/index.html").unwrap();
    assert!(matches!(gateway::fetch(page).await, Err(Error::Unroutable(_))));

    // The SDK client rides the same installed gateway.
    let client = haven.client().await.unwrap();
    assert!(client.list_files().await.unwrap().is_empty());

    assert!(gateway::uninstall().unwrap());
    assert!(matches!(client.list_files().await, Err(Error::NotInstalled)));
}

#[tokio::test]
async fn test_durable_store_through_service() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();

    let key = {
        let haven = sdk::open(Some(&path));
        let key = haven.files.credentials().get_or_create().await.unwrap();
        for (name, size) in [("a.txt", 3u64), ("b.png", 7), ("c.zip", 11)] {
            haven
                .files
                .create_file(
                    &key,
                    NewFile {
                        name: name.to_string(),
                        size_bytes: Some(size),
                        content: Some(FileContent::Bytes(vec![0; size as usize])),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        key
    };

    let haven = sdk::open(Some(&path));
    let stats = haven.files.get_stats(&key).await.unwrap();
    assert_eq!(stats.file_count, 3);
    assert_eq!(stats.total_size_bytes, 21);

    let new_key = haven.files.credentials().reset().await.unwrap();
    assert!(matches!(haven.files.list_files(&key).await, Err(Error::InvalidApiKey)));
    assert_eq!(haven.files.list_files(&new_key).await.unwrap().len(), 3);

    let reopened = sdk::open(Some(&path));
    assert!(reopened.files.credentials().validate(&new_key).await.unwrap());
    assert!(!reopened.files.credentials().validate(&key).await.unwrap());
}
