//! Local filesystem drive backend
//!
//! Emulates a drive with opaque ids on the local filesystem, so folder names
//! can repeat among siblings exactly as they can on a cloud drive.
//! Structure:
//! - <root>/items/{id}/meta.json - item metadata (folders and files)
//! - <root>/items/{id}/content - file bytes
//! - <root>/trash/{id} - deleted files

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use relay_core::{FileId, FileRecord, FolderEntry, FolderId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::backend::{DownloadedFile, DriveBackend};
use crate::error::{StorageError, StorageResult};

/// Id of the folder created with every local drive
pub const ROOT_FOLDER_ID: &str = "root";

const META_FILE: &str = "meta.json";
const CONTENT_FILE: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ItemKind {
    Folder,
    File,
}

/// On-disk metadata for one drive item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemMeta {
    id: String,
    name: String,
    kind: ItemKind,
    parent: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: u64,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl ItemMeta {
    fn folder_entry(&self) -> FolderEntry {
        FolderEntry::new(self.id.clone(), self.name.clone())
    }

    fn file_record(&self) -> FileRecord {
        FileRecord {
            id: FileId::new(self.id.clone()),
            name: self.name.clone(),
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| relay_core::DEFAULT_MIME_TYPE.to_string()),
            size: self.size,
            created: self.created,
            modified: self.modified,
        }
    }
}

/// Local filesystem drive backend
pub struct LocalBackend {
    /// Root directory
    root: PathBuf,
}

impl LocalBackend {
    /// Open (or initialize) a local drive rooted at `root`
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("items")).await?;
        fs::create_dir_all(root.join("trash")).await?;

        let backend = Self { root };

        let root_dir = backend.items_dir().join(ROOT_FOLDER_ID);
        if !root_dir.join(META_FILE).exists() {
            let now = Utc::now();
            let meta = ItemMeta {
                id: ROOT_FOLDER_ID.to_string(),
                name: "My Drive".to_string(),
                kind: ItemKind::Folder,
                parent: None,
                mime_type: None,
                size: 0,
                created: now,
                modified: now,
            };
            fs::create_dir_all(&root_dir).await?;
            backend.write_meta(&meta).await?;
            debug!("Initialized local drive at {}", backend.root.display());
        }

        Ok(backend)
    }

    fn items_dir(&self) -> PathBuf {
        self.root.join("items")
    }

    /// Directory for an item, refusing ids that could escape the items dir
    fn item_dir(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.items_dir().join(id))
    }

    async fn read_meta(&self, id: &str) -> StorageResult<Option<ItemMeta>> {
        let Some(dir) = self.item_dir(id) else {
            return Ok(None);
        };

        match fs::read(dir.join(META_FILE)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn require_folder(&self, id: &FolderId) -> StorageResult<ItemMeta> {
        match self.read_meta(id.as_str()).await? {
            Some(meta) if meta.kind == ItemKind::Folder => Ok(meta),
            _ => Err(StorageError::FolderNotFound(id.to_string())),
        }
    }

    async fn require_file(&self, id: &FileId) -> StorageResult<ItemMeta> {
        match self.read_meta(id.as_str()).await? {
            Some(meta) if meta.kind == ItemKind::File => Ok(meta),
            _ => Err(StorageError::FileNotFound(id.to_string())),
        }
    }

    async fn write_meta(&self, meta: &ItemMeta) -> StorageResult<()> {
        let dir = self.items_dir().join(&meta.id);
        let json = serde_json::to_vec_pretty(meta)?;
        write_atomic(&dir.join(META_FILE), &json).await
    }

    /// All live items whose parent is `parent`
    async fn children(&self, parent: &str) -> StorageResult<Vec<ItemMeta>> {
        let mut items = Vec::new();
        let mut entries = fs::read_dir(self.items_dir()).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let meta_path = entry.path().join(META_FILE);
            let raw = match fs::read(&meta_path).await {
                Ok(raw) => raw,
                // Item still being created
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            match serde_json::from_slice::<ItemMeta>(&raw) {
                Ok(meta) if meta.parent.as_deref() == Some(parent) => items.push(meta),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable item metadata {}: {}", meta_path.display(), e),
            }
        }

        Ok(items)
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl DriveBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self), fields(folder_id = %folder_id))]
    async fn folder_info(&self, folder_id: &FolderId) -> StorageResult<FolderEntry> {
        Ok(self.require_folder(folder_id).await?.folder_entry())
    }

    #[instrument(skip(self), fields(parent_id = %parent_id))]
    async fn create_folder(&self, parent_id: &FolderId, name: &str) -> StorageResult<FolderEntry> {
        self.require_folder(parent_id).await?;

        let now = Utc::now();
        let meta = ItemMeta {
            id: Self::new_id(),
            name: name.to_string(),
            kind: ItemKind::Folder,
            parent: Some(parent_id.to_string()),
            mime_type: None,
            size: 0,
            created: now,
            modified: now,
        };

        fs::create_dir_all(self.items_dir().join(&meta.id)).await?;
        self.write_meta(&meta).await?;

        Ok(meta.folder_entry())
    }

    #[instrument(skip(self, data), fields(folder_id = %folder_id, size = data.len()))]
    async fn upload_file(
        &self,
        folder_id: &FolderId,
        filename: &str,
        data: Bytes,
        mime_type: &str,
    ) -> StorageResult<FileRecord> {
        self.require_folder(folder_id).await?;

        let now = Utc::now();
        let meta = ItemMeta {
            id: Self::new_id(),
            name: filename.to_string(),
            kind: ItemKind::File,
            parent: Some(folder_id.to_string()),
            mime_type: Some(mime_type.to_string()),
            size: data.len() as u64,
            created: now,
            modified: now,
        };

        let dir = self.items_dir().join(&meta.id);
        fs::create_dir_all(&dir).await?;
        // Content first so a listed item always has its bytes
        write_atomic(&dir.join(CONTENT_FILE), &data).await?;
        self.write_meta(&meta).await?;

        Ok(meta.file_record())
    }

    #[instrument(skip(self), fields(parent_id = %parent_id))]
    async fn list_folders(&self, parent_id: &FolderId) -> StorageResult<Vec<FolderEntry>> {
        self.require_folder(parent_id).await?;

        let mut folders: Vec<ItemMeta> = self
            .children(parent_id.as_str())
            .await?
            .into_iter()
            .filter(|meta| meta.kind == ItemKind::Folder)
            .collect();
        folders.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        Ok(folders.iter().map(ItemMeta::folder_entry).collect())
    }

    #[instrument(skip(self), fields(folder_id = %folder_id))]
    async fn list_files(&self, folder_id: &FolderId) -> StorageResult<Vec<FileRecord>> {
        self.require_folder(folder_id).await?;

        Ok(self
            .children(folder_id.as_str())
            .await?
            .iter()
            .filter(|meta| meta.kind == ItemKind::File)
            .map(ItemMeta::file_record)
            .collect())
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn download_file(&self, file_id: &FileId) -> StorageResult<DownloadedFile> {
        let meta = self.require_file(file_id).await?;
        let dir = self.items_dir().join(&meta.id);

        match fs::read(dir.join(CONTENT_FILE)).await {
            Ok(data) => Ok(DownloadedFile {
                record: meta.file_record(),
                data: Bytes::from(data),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(file_id.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn delete_file(&self, file_id: &FileId) -> StorageResult<()> {
        let meta = self.require_file(file_id).await?;
        let from = self.items_dir().join(&meta.id);
        let to = self.root.join("trash").join(&meta.id);

        match fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            // Lost a race with another delete
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(file_id.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Write via temp file + rename
async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;

    Ok(())
}
