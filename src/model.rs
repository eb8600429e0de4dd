use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The payload of a stored file: inline text (usually a data URI) or raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    /// Wraps `bytes` in a `data:<media_type>;base64,` URI.
    pub fn data_uri(media_type: &str, bytes: &[u8]) -> Self {
        FileContent::Text(format!("data:{};base64,{}", media_type, STANDARD.encode(bytes)))
    }

    /// Byte length of the content as stored.
    pub fn byte_len(&self) -> u64 {
        match self {
            FileContent::Text(s) => s.len() as u64,
            FileContent::Bytes(b) => b.len() as u64,
        }
    }

    /// Returns the file's bytes, decoding base64 data URIs.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            FileContent::Bytes(b) => Ok(b.clone()),
            FileContent::Text(s) => match s.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
                Some((_, encoded)) => STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Internal(format!("bad data uri: {}", e))),
                None => Ok(s.as_bytes().to_vec()),
            },
        }
    }
}

/// One stored file's metadata plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    #[serde(alias = "type")]
    pub media_type: String,
    #[serde(alias = "size")]
    pub size_bytes: u64,
    /// Epoch milliseconds, refreshed on every save.
    pub last_modified: i64,
    #[serde(default)]
    pub content: Option<FileContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FileRecord {
    pub fn category(&self) -> FileCategory {
        FileCategory::from_media_type(&self.media_type)
    }
}

/// A record as submitted for creation; the store assigns `id` and `lastModified`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub media_type: String,
    /// Derived from the content when omitted.
    #[serde(default, alias = "size", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FileContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl NewFile {
    pub fn into_record(self, id: String, now: i64) -> FileRecord {
        let size_bytes = self
            .size_bytes
            .unwrap_or_else(|| self.content.as_ref().map(FileContent::byte_len).unwrap_or(0));
        FileRecord {
            id,
            name: self.name,
            media_type: self.media_type,
            size_bytes,
            last_modified: now,
            content: self.content,
            path: self.path,
        }
    }
}

/// Fields to shallow-merge onto an existing record. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, alias = "size", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FileContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FilePatch {
    /// Merges the patch onto `record`. The id never changes; `lastModified` is set to `now`.
    pub fn apply(self, record: &mut FileRecord, now: i64) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(media_type) = self.media_type {
            record.media_type = media_type;
        }
        if let Some(size_bytes) = self.size_bytes {
            record.size_bytes = size_bytes;
        }
        if let Some(content) = self.content {
            record.content = Some(content);
        }
        if let Some(path) = self.path {
            record.path = Some(path);
        }
        record.last_modified = now;
    }
}

/// Aggregate statistics over the whole collection. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_size_bytes: u64,
    pub file_count: usize,
    pub last_updated: i64,
}

/// Confirmation body returned by a delete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    pub deleted: bool,
}

/// The `{success, data, error}` wrapper around every API response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

impl<T> From<Result<T>> for Envelope<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::err(e.public_message()),
        }
    }
}

/// Coarse grouping of files by media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Other,
}

impl FileCategory {
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.starts_with("image/") {
            FileCategory::Image
        } else if media_type.starts_with("video/") {
            FileCategory::Video
        } else if media_type.starts_with("audio/") {
            FileCategory::Audio
        } else if media_type.starts_with("text/")
            || media_type.contains("document")
            || media_type.contains("pdf")
        {
            FileCategory::Document
        } else if media_type.contains("zip")
            || media_type.contains("compressed")
            || media_type.contains("archive")
        {
            FileCategory::Archive
        } else {
            FileCategory::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileCategory::Image => "Images",
            FileCategory::Video => "Videos",
            FileCategory::Audio => "Audio",
            FileCategory::Document => "Documents",
            FileCategory::Archive => "Archives",
            FileCategory::Other => "Other Files",
        }
    }
}

/// Count and byte total for one [`FileCategory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub count: usize,
    pub size_bytes: u64,
}

/// Groups records by category. Categories with no files are absent. Byte
/// totals saturate at `u64::MAX`.
pub fn summarize_categories(records: &[FileRecord]) -> BTreeMap<FileCategory, CategorySummary> {
    let mut groups: BTreeMap<FileCategory, CategorySummary> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.category()).or_default();
        entry.count += 1;
        entry.size_bytes = entry.size_bytes.saturating_add(record.size_bytes);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Size,
    LastModified,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "size" => Ok(SortField::Size),
            "date" | "modified" | "lastmodified" => Ok(SortField::LastModified),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sorts records in place. Name comparison ignores case.
pub fn sort_files(records: &mut [FileRecord], field: SortField, direction: SortDirection) {
    records.sort_by(|a, b| {
        let ordering = match field {
            SortField::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            SortField::Size => a.size_bytes.cmp(&b.size_bytes),
            SortField::LastModified => a.last_modified.cmp(&b.last_modified),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Keeps records whose name contains `term`, case-insensitively.
pub fn filter_by_name(records: Vec<FileRecord>, term: &str) -> Vec<FileRecord> {
    let term = term.to_lowercase();
    records
        .into_iter()
        .filter(|r| r.name.to_lowercase().contains(&term))
        .collect()
}

/// Human-readable byte count, e.g. `512 B`, `1.5 KB`, `3.2 MB`.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KB: f64 = 1024.0;
        let bytes = self.0 as f64;
        if self.0 < 1024 {
            write!(f, "{} B", self.0)
        } else if bytes < KB * KB {
            write!(f, "{:.1} KB", bytes / KB)
        } else if bytes < KB * KB * KB {
            write!(f, "{:.1} MB", bytes / (KB * KB))
        } else {
            write!(f, "{:.1} GB", bytes / (KB * KB * KB))
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    ByteSize(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, name: &str, size: u64, modified: i64) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            media_type: "text/plain".to_string(),
            size_bytes: size,
            last_modified: modified,
            content: None,
            path: None,
        }
    }

    #[test]
    fn test_new_file_accepts_legacy_field_names() {
        let body = json!({"name": "a.png", "type": "image/png", "size": 42, "content": "data:image/png;base64,AA=="});
        let new: NewFile = serde_json::from_value(body).unwrap();
        assert_eq!(new.media_type, "image/png");
        assert_eq!(new.size_bytes, Some(42));
    }

    #[test]
    fn test_new_file_derives_size_from_content() {
        let new = NewFile {
            name: "a.txt".to_string(),
            content: Some(FileContent::Bytes(vec![1, 2, 3])),
            ..Default::default()
        };
        let rec = new.into_record("id1".to_string(), 7);
        assert_eq!(rec.size_bytes, 3);
        assert_eq!(rec.last_modified, 7);
        assert_eq!(rec.id, "id1");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let value = serde_json::to_value(record("x", "a.txt", 10, 5)).unwrap();
        assert_eq!(value["mediaType"], json!("text/plain"));
        assert_eq!(value["sizeBytes"], json!(10));
        assert_eq!(value["lastModified"], json!(5));
        assert!(value.get("path").is_none());
    }

    #[test]
    fn test_patch_keeps_id_and_refreshes_timestamp() {
        let mut rec = record("keep", "old.txt", 1, 1);
        let patch: FilePatch = serde_json::from_value(json!({"id": "other", "name": "new.txt", "lastModified": 3})).unwrap();
        patch.apply(&mut rec, 99);
        assert_eq!(rec.id, "keep");
        assert_eq!(rec.name, "new.txt");
        assert_eq!(rec.size_bytes, 1);
        assert_eq!(rec.last_modified, 99);
    }

    #[test]
    fn test_data_uri_decodes_back() {
        let content = FileContent::data_uri("text/plain", b"hello");
        assert_eq!(content, FileContent::Text("data:text/plain;base64,aGVsbG8=".to_string()));
        assert_eq!(content.to_bytes().unwrap(), b"hello");
        assert_eq!(FileContent::Text("plain".into()).to_bytes().unwrap(), b"plain");
    }

    #[test]
    fn test_categories() {
        assert_eq!(FileCategory::from_media_type("image/png"), FileCategory::Image);
        assert_eq!(FileCategory::from_media_type("application/pdf"), FileCategory::Document);
        assert_eq!(FileCategory::from_media_type("application/zip"), FileCategory::Archive);
        assert_eq!(FileCategory::from_media_type(""), FileCategory::Other);

        let mut img = record("1", "a.png", 10, 0);
        img.media_type = "image/png".to_string();
        let groups = summarize_categories(&[img, record("2", "b.txt", 5, 0), record("3", "c.txt", 6, 0)]);
        assert_eq!(groups[&FileCategory::Image], CategorySummary { count: 1, size_bytes: 10 });
        assert_eq!(groups[&FileCategory::Document], CategorySummary { count: 2, size_bytes: 11 });
        assert!(!groups.contains_key(&FileCategory::Video));

        let huge = summarize_categories(&[record("4", "d.txt", u64::MAX, 0), record("5", "e.txt", u64::MAX, 0)]);
        assert_eq!(huge[&FileCategory::Document], CategorySummary { count: 2, size_bytes: u64::MAX });
    }

    #[test]
    fn test_sort_and_filter() {
        let mut files = vec![record("1", "beta", 30, 2), record("2", "Alpha", 10, 3), record("3", "gamma", 20, 1)];
        sort_files(&mut files, SortField::Name, SortDirection::Asc);
        assert_eq!(files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), ["2", "1", "3"]);
        sort_files(&mut files, SortField::Size, SortDirection::Desc);
        assert_eq!(files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), ["1", "3", "2"]);
        sort_files(&mut files, SortField::LastModified, SortDirection::Asc);
        assert_eq!(files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), ["3", "1", "2"]);

        let hits = filter_by_name(files, "ALP");
        assert_eq!(hits.len(), 1);
        assert_eq!("date".parse::<SortField>().unwrap(), SortField::LastModified);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let ok = serde_json::to_value(Envelope::ok(DeleteReceipt { deleted: true })).unwrap();
        assert_eq!(ok, json!({"success": true, "data": {"deleted": true}}));
        let err = serde_json::to_value(Envelope::<()>::err("Invalid API key")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "Invalid API key"}));
    }
}
