//! Drive backends for the backup relay
//!
//! This crate provides the pluggable remote store behind the relay.
//! Supports a local filesystem drive and Google Drive.

pub mod backend;
pub mod error;
pub mod google;
pub mod local;

pub use backend::{DownloadedFile, DriveBackend, FOLDER_MIME_TYPE};
pub use error::{StorageError, StorageResult};
pub use google::{GoogleDriveBackend, GoogleDriveConfig};
pub use local::{LocalBackend, ROOT_FOLDER_ID};
