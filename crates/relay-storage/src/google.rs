//! Google Drive storage backend
//!
//! Talks to the Drive v3 REST API with a bearer access token owned by the
//! hosting environment. The token is only ever placed in the
//! `Authorization` header and is never logged.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use relay_core::{FileId, FileRecord, FolderEntry, FolderId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::backend::{DownloadedFile, DriveBackend, FOLDER_MIME_TYPE};
use crate::error::{StorageError, StorageResult};

/// Default Drive API base URL
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";

/// Longest slice of an error body kept in error messages
const ERROR_BODY_LIMIT: usize = 300;

const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,trashed";

/// Google Drive backend configuration
#[derive(Clone)]
pub struct GoogleDriveConfig {
    /// OAuth access token for the drive account
    pub access_token: String,
    /// Metadata API base URL
    pub api_url: String,
    /// Media upload base URL
    pub upload_url: String,
    /// Delete permanently instead of moving to trash
    pub permanent_delete: bool,
    /// HTTP client timeout
    pub timeout: Duration,
}

impl GoogleDriveConfig {
    /// Config for the public Google Drive API
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: upload_url_for(DEFAULT_API_URL),
            permanent_delete: false,
            timeout: Duration::from_secs(120),
        }
    }

    /// Point at another API base (proxies, test servers). Also derives the upload URL.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        let api_url = api_url.trim().trim_end_matches('/');
        self.api_url = api_url.to_string();
        self.upload_url = upload_url_for(api_url);
        self
    }

    pub fn with_upload_url(mut self, upload_url: &str) -> Self {
        self.upload_url = upload_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_permanent_delete(mut self, permanent: bool) -> Self {
        self.permanent_delete = permanent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for GoogleDriveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleDriveConfig")
            .field("access_token", &"***")
            .field("api_url", &self.api_url)
            .field("upload_url", &self.upload_url)
            .field("permanent_delete", &self.permanent_delete)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `https://host/drive/v3` -> `https://host/upload/drive/v3`
fn upload_url_for(api_url: &str) -> String {
    if api_url.contains("/drive/v3") {
        api_url.replacen("/drive/v3", "/upload/drive/v3", 1)
    } else {
        format!("{api_url}/upload")
    }
}

/// What a request addresses, for mapping 404/403 responses
#[derive(Clone, Copy)]
enum Target<'a> {
    Folder(&'a str),
    File(&'a str),
}

impl Target<'_> {
    fn not_found(self) -> StorageError {
        match self {
            Target::Folder(id) => StorageError::FolderNotFound(id.to_string()),
            Target::File(id) => StorageError::FileNotFound(id.to_string()),
        }
    }

    fn denied(self) -> StorageError {
        match self {
            Target::Folder(id) | Target::File(id) => StorageError::PermissionDenied(id.to_string()),
        }
    }
}

/// Google Drive storage backend
pub struct GoogleDriveBackend {
    http: Client,
    config: GoogleDriveConfig,
}

impl GoogleDriveBackend {
    /// Create a new Google Drive backend
    pub fn new(config: GoogleDriveConfig) -> StorageResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path)
    }

    async fn send(&self, request: RequestBuilder, target: Target<'_>) -> StorageResult<Response> {
        let response = request
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(target.not_found());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to read {} error body: {}", status, e);
                String::new()
            }
        };
        match status {
            StatusCode::UNAUTHORIZED => Err(target.denied()),
            // Drive reports per-user rate limits as 403
            StatusCode::FORBIDDEN if is_rate_limit_body(&body) => Err(StorageError::Api {
                status: 429,
                message: "rate limit exceeded".to_string(),
            }),
            StatusCode::FORBIDDEN => Err(target.denied()),
            _ => Err(StorageError::Api {
                status: status.as_u16(),
                message: truncate_body(&body),
            }),
        }
    }

    /// Metadata for any item
    async fn item(&self, id: &str, target: Target<'_>) -> StorageResult<DriveFileDto> {
        let request = self.http.get(self.url(&format!("files/{id}"))).query(&[
            ("fields", FILE_FIELDS),
            ("supportsAllDrives", "true"),
        ]);
        let response = self.send(request, target).await?;
        Ok(response.json::<DriveFileDto>().await?)
    }

    /// Metadata for a live (non-trashed) file
    async fn live_file(&self, file_id: &FileId) -> StorageResult<DriveFileDto> {
        let target = Target::File(file_id.as_str());
        let item = self.item(file_id.as_str(), target).await?;
        if item.trashed || item.is_folder() {
            return Err(target.not_found());
        }
        Ok(item)
    }

    /// All live children of a folder, folders or files, following pagination
    async fn children(&self, parent: &FolderId, folders: bool) -> StorageResult<Vec<DriveFileDto>> {
        let op = if folders { "=" } else { "!=" };
        let q = format!(
            "'{}' in parents and mimeType {} '{}' and trashed = false",
            escape_query_value(parent.as_str()),
            op,
            FOLDER_MIME_TYPE
        );
        let fields = format!("nextPageToken,files({FILE_FIELDS})");

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("q", q.clone()),
                ("fields", fields.clone()),
                ("pageSize", "1000".to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let request = self.http.get(self.url("files")).query(&query);
            let page: FileListDto = self
                .send(request, Target::Folder(parent.as_str()))
                .await?
                .json()
                .await?;

            items.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} children of {}", items.len(), parent);
        Ok(items)
    }
}

#[async_trait]
impl DriveBackend for GoogleDriveBackend {
    fn name(&self) -> &str {
        "google_drive"
    }

    #[instrument(skip(self), fields(folder_id = %folder_id))]
    async fn folder_info(&self, folder_id: &FolderId) -> StorageResult<FolderEntry> {
        let target = Target::Folder(folder_id.as_str());
        let item = self.item(folder_id.as_str(), target).await?;
        if item.trashed || !item.is_folder() {
            return Err(target.not_found());
        }
        Ok(FolderEntry::new(item.id, item.name.unwrap_or_default()))
    }

    #[instrument(skip(self), fields(parent_id = %parent_id))]
    async fn create_folder(&self, parent_id: &FolderId, name: &str) -> StorageResult<FolderEntry> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id.as_str()],
        });
        let request = self
            .http
            .post(self.url("files"))
            .query(&[("fields", "id,name"), ("supportsAllDrives", "true")])
            .json(&body);

        let created: DriveFileDto = self
            .send(request, Target::Folder(parent_id.as_str()))
            .await?
            .json()
            .await?;

        Ok(FolderEntry::new(
            created.id,
            created.name.unwrap_or_else(|| name.to_string()),
        ))
    }

    #[instrument(skip(self, data), fields(folder_id = %folder_id, size = data.len()))]
    async fn upload_file(
        &self,
        folder_id: &FolderId,
        filename: &str,
        data: Bytes,
        mime_type: &str,
    ) -> StorageResult<FileRecord> {
        let metadata = serde_json::json!({
            "name": filename,
            "mimeType": mime_type,
            "parents": [folder_id.as_str()],
        });

        let boundary = format!("relay-{}", uuid::Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(data.len() + 512);

        // Metadata part
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(b"\r\n");

        // File content part
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}--").as_bytes());

        let request = self
            .http
            .post(format!("{}/files", self.config.upload_url))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", FILE_FIELDS),
                ("supportsAllDrives", "true"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);

        let created: DriveFileDto = self
            .send(request, Target::Folder(folder_id.as_str()))
            .await?
            .json()
            .await?;

        let mut record = created.into_record();
        // Drive omits size for some uploads until processing finishes
        if record.size == 0 {
            record.size = data.len() as u64;
        }
        Ok(record)
    }

    #[instrument(skip(self), fields(parent_id = %parent_id))]
    async fn list_folders(&self, parent_id: &FolderId) -> StorageResult<Vec<FolderEntry>> {
        // A query against a missing parent returns an empty page, not a 404
        self.folder_info(parent_id).await?;

        Ok(self
            .children(parent_id, true)
            .await?
            .into_iter()
            .map(|item| FolderEntry::new(item.id, item.name.unwrap_or_default()))
            .collect())
    }

    #[instrument(skip(self), fields(folder_id = %folder_id))]
    async fn list_files(&self, folder_id: &FolderId) -> StorageResult<Vec<FileRecord>> {
        self.folder_info(folder_id).await?;

        Ok(self
            .children(folder_id, false)
            .await?
            .into_iter()
            .map(DriveFileDto::into_record)
            .collect())
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn download_file(&self, file_id: &FileId) -> StorageResult<DownloadedFile> {
        let item = self.live_file(file_id).await?;

        let request = self
            .http
            .get(self.url(&format!("files/{}", file_id.as_str())))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let data = self
            .send(request, Target::File(file_id.as_str()))
            .await?
            .bytes()
            .await?;

        let mut record = item.into_record();
        record.size = data.len() as u64;
        Ok(DownloadedFile { record, data })
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn delete_file(&self, file_id: &FileId) -> StorageResult<()> {
        self.live_file(file_id).await?;

        let url = self.url(&format!("files/{}", file_id.as_str()));
        let request = if self.config.permanent_delete {
            self.http
                .delete(url)
                .query(&[("supportsAllDrives", "true")])
        } else {
            self.http
                .patch(url)
                .query(&[("fields", "id,trashed"), ("supportsAllDrives", "true")])
                .json(&serde_json::json!({ "trashed": true }))
        };

        self.send(request, Target::File(file_id.as_str())).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListDto {
    #[serde(default)]
    files: Vec<DriveFileDto>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileDto {
    id: String,
    name: Option<String>,
    mime_type: Option<String>,
    /// Drive encodes int64 as a string
    size: Option<String>,
    created_time: Option<String>,
    modified_time: Option<String>,
    #[serde(default)]
    trashed: bool,
}

impl DriveFileDto {
    fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    fn into_record(self) -> FileRecord {
        FileRecord {
            id: FileId::new(self.id),
            name: self.name.unwrap_or_default(),
            mime_type: self
                .mime_type
                .unwrap_or_else(|| relay_core::DEFAULT_MIME_TYPE.to_string()),
            size: self.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            created: parse_time(self.created_time.as_deref()),
            modified: parse_time(self.modified_time.as_deref()),
        }
    }
}

fn parse_time(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Escape a value for use inside a single-quoted Drive query string
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn is_rate_limit_body(body: &str) -> bool {
    body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded")
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
