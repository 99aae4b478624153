//! Storage error types

use relay_core::ProxyError;
use thiserror::Error;

/// Storage error type
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Access denied: {0}")]
    PermissionDenied(String),

    #[error("Drive API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Drive transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected drive response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Missing item, as opposed to a failing drive
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::FolderNotFound(_) | StorageError::FileNotFound(_)
        )
    }

    /// Transient failures worth a caller-side retry
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Api { status, .. } => *status == 429 || *status >= 500,
            StorageError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            StorageError::Api { status, .. } => Some(*status),
            StorageError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for ProxyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FolderNotFound(id) => ProxyError::NotFound(format!("Folder {id}")),
            StorageError::FileNotFound(id) => ProxyError::NotFound(format!("File {id}")),
            StorageError::PermissionDenied(id) => {
                ProxyError::PermissionOrNotFound(format!("Item {id}"))
            }
            other => ProxyError::Upstream {
                retryable: other.is_retryable(),
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}
