//! Input validation
//!
//! Runs after a request has been decoded and before anything reaches the
//! drive. Names are checked but never rewritten: folder lookups compare the
//! caller's string byte for byte.

use lazy_static::lazy_static;
use regex::Regex;
use relay_core::{ProxyError, ProxyRequest};

lazy_static! {
    /// Drive item id: Google ids and local ids are both URL-safe tokens
    static ref DRIVE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,256}$").unwrap();

    /// MIME type: type/subtype with optional parameters
    static ref MIME_TYPE_RE: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]{0,126}/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]{0,126}(\s*;.*)?$"
    ).unwrap();
}

/// Longest folder or file name, in bytes
pub const MAX_NAME_BYTES: usize = 255;

/// Validate a drive id field
pub fn validate_drive_id(field: &'static str, value: &str) -> Result<(), ProxyError> {
    if value.is_empty() {
        return Err(ProxyError::InvalidField {
            field,
            reason: "is required".into(),
        });
    }
    if !DRIVE_ID_RE.is_match(value) {
        return Err(ProxyError::InvalidField {
            field,
            reason: "must be 1-256 letters, digits, '-' or '_'".into(),
        });
    }
    Ok(())
}

/// Validate a folder or file name
pub fn validate_item_name(field: &'static str, value: &str) -> Result<(), ProxyError> {
    let invalid = |reason: &str| ProxyError::InvalidField {
        field,
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("is required"));
    }
    if value.len() > MAX_NAME_BYTES {
        return Err(invalid("must be at most 255 bytes"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(invalid("path separators not allowed"));
    }
    if value == "." || value == ".." {
        return Err(invalid("uses a reserved name"));
    }
    Ok(())
}

/// Validate an optional MIME type
pub fn validate_mime_type(value: &str) -> Result<(), ProxyError> {
    if !MIME_TYPE_RE.is_match(value) {
        return Err(ProxyError::InvalidField {
            field: "mimeType",
            reason: "must look like type/subtype".into(),
        });
    }
    Ok(())
}

/// Validate every field of a decoded request
pub fn validate_request(request: &ProxyRequest) -> Result<(), ProxyError> {
    match request {
        ProxyRequest::TestConnection(p) => validate_drive_id("folder_id", &p.folder_id),
        ProxyRequest::CreateFolder(p) => {
            validate_drive_id("parent_id", &p.parent_id)?;
            validate_item_name("folder_name", &p.folder_name)
        }
        ProxyRequest::UploadFile(p) => {
            validate_drive_id("folder_id", &p.folder_id)?;
            validate_item_name("filename", &p.filename)?;
            match p.mime_type.as_deref() {
                Some(mime) if !mime.is_empty() => validate_mime_type(mime),
                _ => Ok(()),
            }
        }
        ProxyRequest::ListFolders(p) => validate_drive_id("parent_id", &p.parent_id),
        ProxyRequest::ListFiles(p) => {
            // Only the fields of the mode that will actually be used
            match p.folder_ref()? {
                relay_core::FolderRef::Direct(id) => validate_drive_id("folder_id", id.as_str()),
                relay_core::FolderRef::ByName { parent, name } => {
                    validate_drive_id("parent_folder_id", parent.as_str())?;
                    validate_item_name("folder_name", &name)
                }
            }
        }
        ProxyRequest::DownloadFile(p) | ProxyRequest::DeleteFile(p) => {
            validate_drive_id("file_id", &p.file_id)
        }
    }
}
