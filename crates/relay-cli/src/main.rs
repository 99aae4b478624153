use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use relay_core::{decode_content, encode_content};
use reqwest::{Client, Url};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay", version, about = "Backup relay CLI")]
struct Cli {
    /// Relay endpoint URL (e.g. http://localhost:8080/)
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8080/")]
    url: String,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,
    /// Print the response body exactly as received
    #[arg(long)]
    raw: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Liveness check
    Ping,
    /// Check that a folder is reachable
    TestConnection(FolderArgs),
    /// Create a child folder
    CreateFolder(CreateFolderArgs),
    /// Upload a local file
    Upload(UploadArgs),
    /// List child folders
    ListFolders(ParentArgs),
    /// List files in a folder
    ListFiles(ListFilesArgs),
    /// Download a file
    Download(DownloadArgs),
    /// Delete a file
    Delete(FileArgs),
}

#[derive(Args)]
struct FolderArgs {
    folder_id: String,
}

#[derive(Args)]
struct ParentArgs {
    parent_id: String,
}

#[derive(Args)]
struct FileArgs {
    file_id: String,
}

#[derive(Args)]
struct CreateFolderArgs {
    parent_id: String,
    name: String,
}

#[derive(Args)]
struct UploadArgs {
    /// Target folder id
    folder_id: String,
    /// Local file to upload
    path: PathBuf,
    /// Remote file name (defaults to the local one)
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    mime_type: Option<String>,
}

#[derive(Args)]
struct ListFilesArgs {
    #[arg(long, conflicts_with_all = ["parent_id", "name"])]
    folder_id: Option<String>,
    #[arg(long, requires = "name")]
    parent_id: Option<String>,
    #[arg(long, requires = "parent_id")]
    name: Option<String>,
}

#[derive(Args)]
struct DownloadArgs {
    file_id: String,
    /// Where to write the file
    #[arg(long, short)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = build_client(cli.timeout)?;
    let url = Url::parse(&cli.url).context("invalid --url")?;

    let mut output = None;
    let body = match cli.command {
        Command::Ping => None,
        Command::TestConnection(args) => {
            Some(json!({"action": "test_connection", "folder_id": args.folder_id}))
        }
        Command::CreateFolder(args) => Some(json!({
            "action": "create_folder",
            "parent_id": args.parent_id,
            "folder_name": args.name,
        })),
        Command::Upload(args) => {
            let bytes = tokio::fs::read(&args.path)
                .await
                .with_context(|| format!("failed to read {}", args.path.display()))?;
            let name = match args.name {
                Some(name) => name,
                None => args
                    .path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("cannot derive a file name from {}", args.path.display()))?,
            };
            let mut body = json!({
                "action": "upload_file",
                "folder_id": args.folder_id,
                "filename": name,
                "content": encode_content(&bytes),
            });
            if let Some(mime) = args.mime_type {
                body["mimeType"] = json!(mime);
            }
            Some(body)
        }
        Command::ListFolders(args) => {
            Some(json!({"action": "list_folders", "parent_id": args.parent_id}))
        }
        Command::ListFiles(args) => match (args.folder_id, args.parent_id, args.name) {
            (Some(folder_id), _, _) => Some(json!({"action": "list_files", "folder_id": folder_id})),
            (None, Some(parent), Some(name)) => Some(json!({
                "action": "list_files",
                "parent_folder_id": parent,
                "folder_name": name,
            })),
            _ => return Err(anyhow!("use --folder-id, or --parent-id with --name")),
        },
        Command::Download(args) => {
            output = Some(args.output);
            Some(json!({"action": "download_file", "file_id": args.file_id}))
        }
        Command::Delete(args) => Some(json!({"action": "delete_file", "file_id": args.file_id})),
    };

    let (text, envelope) = send(&client, &url, body.as_ref()).await?;

    match output {
        Some(path) if success(&envelope) => {
            let content = envelope["data"]["content"]
                .as_str()
                .ok_or_else(|| anyhow!("response has no content"))?;
            let decoded = decode_content(content).map_err(|e| anyhow!("{e}"))?;
            tokio::fs::write(&path, &decoded.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", decoded.bytes.len(), path.display());
        }
        _ => println!("{}", render(&text, &envelope, cli.raw)?),
    }

    if !success(&envelope) {
        std::process::exit(1);
    }

    Ok(())
}

fn build_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);
    Ok(Client::builder().timeout(timeout).build()?)
}

fn success(envelope: &Value) -> bool {
    envelope["success"].as_bool().unwrap_or(false)
}

/// GET when there is no body, POST otherwise
async fn send(client: &Client, url: &Url, body: Option<&Value>) -> Result<(String, Value)> {
    let request = match body {
        Some(body) => client.post(url.clone()).json(body),
        None => client.get(url.clone()),
    };

    let response = request.send().await.context("request failed")?;
    let status = response.status();
    let text = response.text().await.context("failed to read body")?;
    if !status.is_success() {
        return Err(anyhow!("HTTP {}: {}", status, text));
    }

    let envelope = serde_json::from_str(&text)
        .with_context(|| format!("relay returned a non-JSON body: {text}"))?;
    Ok((text, envelope))
}

/// The body exactly as received when `raw`, pretty-printed otherwise
fn render(text: &str, envelope: &Value, raw: bool) -> Result<String> {
    if raw {
        Ok(text.to_string())
    } else {
        Ok(serde_json::to_string_pretty(envelope)?)
    }
}
