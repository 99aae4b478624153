//! Action dispatch
//!
//! [`ActionHandler`] turns one request body into one [`Envelope`]. Decoding
//! and validation finish before the drive is touched, and every error is
//! converted into a failure envelope here, so nothing past this point can
//! take the process down.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use relay_core::{
    decode_content, encode_content, requested_action, ContentDigest, CreateFolderParams, Envelope,
    FileId, FileParams, FolderId, ListFilesParams, ListFoldersParams, ProxyError, ProxyRequest,
    Redactor, TestConnectionParams, UploadFileParams, DEFAULT_ACTION, DEFAULT_MIME_TYPE,
};
use relay_storage::DriveBackend;
use serde_json::{json, Value};

use crate::logging::{LogSink, SafeLogger};
use crate::resolver::resolve_folder;
use crate::validation::validate_request;

/// Message of the liveness envelope
pub const LIVENESS_MESSAGE: &str = "Backup relay is running";

/// Executes relay actions against a drive
pub struct ActionHandler {
    backend: Arc<dyn DriveBackend>,
    redactor: Arc<Redactor>,
    log: SafeLogger,
}

impl ActionHandler {
    pub fn new(backend: Arc<dyn DriveBackend>, sink: Arc<dyn LogSink>, redactor: Redactor) -> Self {
        let redactor = Arc::new(redactor);
        Self {
            backend,
            log: SafeLogger::new(sink, redactor.clone()),
            redactor,
        }
    }

    /// Name of the configured drive backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Health payload, answered without touching the drive
    pub fn liveness(&self, method: &str) -> Envelope {
        Envelope::ok(
            LIVENESS_MESSAGE,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": Utc::now().to_rfc3339(),
                "method": method,
            }),
        )
    }

    /// Handle one request body
    pub async fn handle(&self, method: &str, body: &[u8]) -> Envelope {
        if body.iter().all(u8::is_ascii_whitespace) {
            self.log.debug(&format!("method={method} liveness"));
            return self.liveness(method);
        }

        let start = Instant::now();

        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                self.log.warn(&format!(
                    "method={method} bytes={} rejected: malformed JSON",
                    body.len()
                ));
                let err = ProxyError::InvalidRequest(format!("malformed JSON: {e}"));
                return Envelope::from_error(&err, DEFAULT_ACTION, &self.redactor);
            }
        };

        let action = requested_action(&value).unwrap_or(DEFAULT_ACTION).to_string();
        self.log.info(&format!(
            "method={method} action={action} bytes={}",
            body.len()
        ));

        let outcome = match ProxyRequest::from_value(value) {
            Ok(request) => match validate_request(&request) {
                Ok(()) => self.dispatch(request).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let elapsed_ms = start.elapsed().as_millis();
        match outcome {
            Ok(envelope) => {
                self.log.info(&format!(
                    "action={action} success=true elapsed_ms={elapsed_ms}"
                ));
                envelope
            }
            Err(err) => {
                self.log.warn(&format!(
                    "action={action} success=false kind={} elapsed_ms={elapsed_ms} error={err}",
                    err.kind().as_str()
                ));
                Envelope::from_error(&err, &action, &self.redactor)
            }
        }
    }

    /// Run a decoded and validated request
    pub async fn dispatch(&self, request: ProxyRequest) -> Result<Envelope, ProxyError> {
        match request {
            ProxyRequest::TestConnection(p) => self.test_connection(p).await,
            ProxyRequest::CreateFolder(p) => self.create_folder(p).await,
            ProxyRequest::UploadFile(p) => self.upload_file(p).await,
            ProxyRequest::ListFolders(p) => self.list_folders(p).await,
            ProxyRequest::ListFiles(p) => self.list_files(p).await,
            ProxyRequest::DownloadFile(p) => self.download_file(p).await,
            ProxyRequest::DeleteFile(p) => self.delete_file(p).await,
        }
    }

    async fn test_connection(&self, p: TestConnectionParams) -> Result<Envelope, ProxyError> {
        let folder = self.backend.folder_info(&FolderId::new(p.folder_id)).await?;
        Ok(Envelope::ok(
            format!("Connected to folder '{}'", folder.name),
            json!({
                "folder_id": folder.id,
                "folder_name": folder.name,
            }),
        ))
    }

    async fn create_folder(&self, p: CreateFolderParams) -> Result<Envelope, ProxyError> {
        let parent = FolderId::new(p.parent_id);
        let folder = self.backend.create_folder(&parent, &p.folder_name).await?;
        Ok(Envelope::ok(
            format!("Folder '{}' created", folder.name),
            json!({
                "folder_id": folder.id,
                "folder_name": folder.name,
                "parent_id": parent,
            }),
        ))
    }

    async fn upload_file(&self, p: UploadFileParams) -> Result<Envelope, ProxyError> {
        let decoded = decode_content(&p.content)?;
        let mime_type = p
            .mime_type
            .filter(|m| !m.is_empty())
            .or(decoded.mime_type)
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let digest = ContentDigest::from_data(&decoded.bytes);
        let folder = FolderId::new(p.folder_id);
        let record = self
            .backend
            .upload_file(&folder, &p.filename, Bytes::from(decoded.bytes), &mime_type)
            .await?;

        Ok(Envelope::ok(
            format!("File '{}' uploaded ({} bytes)", record.name, record.size),
            json!({
                "file_id": record.id,
                "file_name": record.name,
                "mimeType": record.mime_type,
                "size": record.size,
                "sha256": digest.to_hex(),
                "folder_id": folder,
            }),
        ))
    }

    async fn list_folders(&self, p: ListFoldersParams) -> Result<Envelope, ProxyError> {
        let parent = FolderId::new(p.parent_id);
        let folders = self.backend.list_folders(&parent).await?;
        let count = folders.len();
        Ok(Envelope::ok(
            format!("Found {count} folders"),
            json!({
                "parent_id": parent,
                "folders": folders,
                "count": count,
            }),
        ))
    }

    async fn list_files(&self, p: ListFilesParams) -> Result<Envelope, ProxyError> {
        let resolved = resolve_folder(self.backend.as_ref(), &p.folder_ref()?).await?;
        let files = self.backend.list_files(&resolved.folder_id).await?;
        let count = files.len();
        Ok(Envelope::ok(
            format!("Found {count} files"),
            json!({
                "folder_id": resolved.folder_id,
                "resolved_by": resolved.mode,
                "files": files,
                "count": count,
            }),
        ))
    }

    async fn download_file(&self, p: FileParams) -> Result<Envelope, ProxyError> {
        let file = self.backend.download_file(&FileId::new(p.file_id)).await?;
        let digest = ContentDigest::from_data(&file.data);
        Ok(Envelope::ok(
            format!("File '{}' downloaded ({} bytes)", file.record.name, file.data.len()),
            json!({
                "file_id": file.record.id,
                "file_name": file.record.name,
                "mimeType": file.record.mime_type,
                "size": file.data.len(),
                "sha256": digest.to_hex(),
                "content": encode_content(&file.data),
            }),
        ))
    }

    async fn delete_file(&self, p: FileParams) -> Result<Envelope, ProxyError> {
        let file_id = FileId::new(p.file_id);
        self.backend.delete_file(&file_id).await?;
        Ok(Envelope::ok(
            format!("File {file_id} deleted"),
            json!({
                "file_id": file_id,
                "deleted": true,
            }),
        ))
    }
}
