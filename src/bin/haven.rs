use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use haven_store::model::{
    filter_by_name, format_size, sort_files, FileContent, NewFile, SortDirection, SortField,
};
use haven_store::sdk;
use haven_store::server::gateway::{self, Offline};
use haven_store::server::ApiRequest;
use http::Method;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (falls back to HAVEN_DATA_DIR, then ./data)
    #[arg(short, long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or reset the API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// List stored files
    List {
        /// name, size or date
        #[arg(long, default_value = "date")]
        sort: SortField,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        search: Option<String>,
    },
    /// Print a file's metadata, or write its content with --output
    Get {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a local file
    Upload {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        media_type: Option<String>,
    },
    /// Delete a file
    Rm { id: String },
    /// Delete every file
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Storage totals and per-category breakdown
    Stats,
    /// Dump every record as JSON
    Export,
    /// Send a request through the virtual API
    Request {
        method: String,
        url: String,
        #[arg(long)]
        body: Option<String>,
        /// Key to send instead of the stored one
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum KeyAction {
    Show,
    Reset,
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn guess_media_type(path: &Path, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let haven = sdk::open(cli.data_dir.as_deref());
    let files = &haven.files;
    let key = files.credentials().get_or_create().await?;

    match cli.command {
        Commands::Key { action: KeyAction::Show } => {
            println!("{}", key);
        }
        Commands::Key { action: KeyAction::Reset } => {
            let new_key = files.credentials().reset().await?;
            println!("{}", new_key);
        }
        Commands::List { sort, desc, search } => {
            let mut list = files.list_files(&key).await?;
            if let Some(term) = search {
                list = filter_by_name(list, &term);
            }
            let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
            sort_files(&mut list, sort, direction);
            for f in &list {
                println!(
                    "{}  {:>10}  {}  {}",
                    f.id,
                    format_size(f.size_bytes),
                    format_time(f.last_modified),
                    f.name
                );
            }
        }
        Commands::Get { id, output } => {
            let file = files.get_file(&key, &id).await?;
            match output {
                Some(out) => {
                    let bytes = file.content.as_ref().map(FileContent::to_bytes).transpose()?;
                    tokio::fs::write(&out, bytes.unwrap_or_default())
                        .await
                        .with_context(|| format!("writing {:?}", out))?;
                    println!("OK");
                }
                None => {
                    let mut meta = file;
                    meta.content = None;
                    println!("{}", serde_json::to_string_pretty(&meta)?);
                }
            }
        }
        Commands::Upload { path, name, media_type } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {:?}", path))?;
            let media_type = media_type.unwrap_or_else(|| guess_media_type(&path, &bytes));
            let name = name
                .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "upload".to_string());
            let new = NewFile {
                name,
                size_bytes: Some(bytes.len() as u64),
                content: Some(FileContent::data_uri(&media_type, &bytes)),
                media_type,
                path: Some(path.display().to_string()),
            };
            let record = files.create_file(&key, new).await?;
            println!("{}", record.id);
        }
        Commands::Rm { id } => {
            files.delete_file(&key, &id).await?;
            println!("OK");
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every file without --yes");
            }
            let removed = files.clear_files(&key).await?;
            println!("Removed {} files", removed);
        }
        Commands::Stats => {
            let stats = files.get_stats(&key).await?;
            println!("Files:        {}", stats.file_count);
            println!("Total size:   {}", format_size(stats.total_size_bytes));
            println!("Last updated: {}", format_time(stats.last_updated));
            for (category, summary) in files.category_breakdown(&key).await? {
                println!(
                    "  {:<12} {:>5}  {:>10}",
                    category.label(),
                    summary.count,
                    format_size(summary.size_bytes)
                );
            }
        }
        Commands::Export => {
            let list = files.list_files(&key).await?;
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        Commands::Request { method, url, body, key: override_key } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .context("invalid method")?;
            let mut request = ApiRequest::new(method, &url)?.api_key(override_key.as_deref().unwrap_or(&key))?;
            if let Some(body) = body {
                request = request.body(body);
            }

            haven.install(Arc::new(Offline))?;
            let result = gateway::fetch(request).await;
            gateway::uninstall()?;

            let response = result?;
            println!("{}", response.status);
            let body: serde_json::Value = serde_json::from_str(&response.body)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
