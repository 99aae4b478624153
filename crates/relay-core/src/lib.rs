//! Core protocol types for the backup relay
//!
//! This crate defines the action protocol spoken between a backend and the
//! relay: typed requests, drive item records, the response envelope, the
//! error taxonomy and the transport codec for file content.

pub mod action;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod model;
pub mod redact;

pub use action::{
    requested_action, ActionKind, CreateFolderParams, FileParams, FolderRef, ListFilesParams,
    ListFoldersParams, ProxyRequest, TestConnectionParams, UploadFileParams, DEFAULT_ACTION,
};
pub use codec::{decode_content, encode_content, ContentDigest, DecodedContent, DEFAULT_MIME_TYPE};
pub use envelope::Envelope;
pub use error::{ErrorKind, ProxyError, Result};
pub use model::{FileId, FileRecord, FolderEntry, FolderId};
pub use redact::Redactor;
