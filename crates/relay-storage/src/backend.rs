//! Drive backend trait
//!
//! The relay never talks to a drive directly; every operation goes through
//! [`DriveBackend`], so handlers can run against the local filesystem in
//! tests and against Google Drive in production.

use async_trait::async_trait;
use bytes::Bytes;
use relay_core::{FileId, FileRecord, FolderEntry, FolderId};

use crate::error::StorageResult;

/// MIME type the drives use for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// File content plus its metadata
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub record: FileRecord,
    pub data: Bytes,
}

/// A remote store holding backup folders and files
#[async_trait]
pub trait DriveBackend: Send + Sync {
    /// Get backend name/type
    fn name(&self) -> &str;

    /// Look up a folder by id
    async fn folder_info(&self, folder_id: &FolderId) -> StorageResult<FolderEntry>;

    /// Create a child folder. Not idempotent: the same name twice gives two folders.
    async fn create_folder(&self, parent_id: &FolderId, name: &str) -> StorageResult<FolderEntry>;

    /// Store already-decoded bytes as a new file in a folder
    async fn upload_file(
        &self,
        folder_id: &FolderId,
        filename: &str,
        data: Bytes,
        mime_type: &str,
    ) -> StorageResult<FileRecord>;

    /// Immediate child folders. An inaccessible parent is an error, not an empty list.
    async fn list_folders(&self, parent_id: &FolderId) -> StorageResult<Vec<FolderEntry>>;

    /// Files (not folders) directly inside a folder, in no particular order
    async fn list_files(&self, folder_id: &FolderId) -> StorageResult<Vec<FileRecord>>;

    /// Read a file
    async fn download_file(&self, file_id: &FileId) -> StorageResult<DownloadedFile>;

    /// Delete a file. A missing or already deleted id is `FileNotFound`.
    async fn delete_file(&self, file_id: &FileId) -> StorageResult<()>;
}
