//! Error types for relay-core
//!
//! Every failure the relay can report maps onto one [`ErrorKind`], which is
//! what callers see in `error_details.kind`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure category carried in the response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed JSON, unknown action or bad fields; the drive is never called
    InvalidRequest,
    /// Folder or file does not exist, or a name lookup found nothing
    NotFound,
    /// The drive denied access or cannot tell denial from absence
    PermissionOrNotFound,
    /// The drive call itself failed
    UpstreamFailure,
    /// Uploaded content could not be decoded
    EncodingError,
    /// A name lookup matched more than one folder
    AmbiguousFolder,
}

impl ErrorKind {
    /// Wire name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::PermissionOrNotFound => "PERMISSION_OR_NOT_FOUND",
            ErrorKind::UpstreamFailure => "UPSTREAM_FAILURE",
            ErrorKind::EncodingError => "ENCODING_ERROR",
            ErrorKind::AmbiguousFolder => "AMBIGUOUS_FOLDER",
        }
    }
}

/// Relay error type
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{0} was not found or is not accessible")]
    NotFound(String),

    #[error("Parent folder {parent} has no folder named '{name}'")]
    FolderNameNotFound { parent: String, name: String },

    #[error("{0} was not found or is not accessible")]
    PermissionOrNotFound(String),

    #[error("Parent folder {parent} has {} folders named '{name}'", candidates.len())]
    AmbiguousFolder {
        parent: String,
        name: String,
        candidates: Vec<String>,
    },

    #[error("Drive request failed: {message}")]
    Upstream {
        message: String,
        retryable: bool,
        status: Option<u16>,
    },

    #[error("Content decoding failed: {0}")]
    Encoding(String),
}

impl ProxyError {
    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::InvalidRequest(_)
            | ProxyError::UnsupportedAction(_)
            | ProxyError::InvalidField { .. } => ErrorKind::InvalidRequest,
            ProxyError::NotFound(_) | ProxyError::FolderNameNotFound { .. } => ErrorKind::NotFound,
            ProxyError::PermissionOrNotFound(_) => ErrorKind::PermissionOrNotFound,
            ProxyError::AmbiguousFolder { .. } => ErrorKind::AmbiguousFolder,
            ProxyError::Upstream { .. } => ErrorKind::UpstreamFailure,
            ProxyError::Encoding(_) => ErrorKind::EncodingError,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProxyError::Upstream { retryable: true, .. })
    }

    /// Structured context for `error_details`.
    ///
    /// Only validated identifiers and flags go in here. Caller-supplied free
    /// text, including an unknown action name, is added by the envelope
    /// builder after redaction.
    pub fn context(&self) -> Value {
        let mut details = json!({ "kind": self.kind() });
        match self {
            ProxyError::InvalidField { field, .. } => {
                details["field"] = json!(field);
            }
            ProxyError::FolderNameNotFound { parent, name } => {
                details["parent_folder_id"] = json!(parent);
                details["folder_name"] = json!(name);
            }
            ProxyError::AmbiguousFolder {
                parent,
                name,
                candidates,
            } => {
                details["parent_folder_id"] = json!(parent);
                details["folder_name"] = json!(name);
                details["candidates"] = json!(candidates);
            }
            ProxyError::Upstream {
                retryable, status, ..
            } => {
                details["retryable"] = json!(retryable);
                if let Some(status) = status {
                    details["status"] = json!(status);
                }
            }
            _ => {}
        }
        details
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ProxyError::UnsupportedAction("default".into()).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            ProxyError::FolderNameNotFound {
                parent: "P1".into(),
                name: "2099-01-01".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ProxyError::Encoding("bad".into()).kind(),
            ErrorKind::EncodingError
        );
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::PermissionOrNotFound).unwrap();
        assert_eq!(json, "\"PERMISSION_OR_NOT_FOUND\"");
        assert_eq!(ErrorKind::PermissionOrNotFound.as_str(), "PERMISSION_OR_NOT_FOUND");
    }

    #[test]
    fn test_retryable_only_for_flagged_upstream() {
        let transient = ProxyError::Upstream {
            message: "rate limited".into(),
            retryable: true,
            status: Some(429),
        };
        assert!(transient.is_retryable());
        assert_eq!(transient.context()["status"], 429);

        assert!(!ProxyError::NotFound("File abc".into()).is_retryable());
    }

    #[test]
    fn test_ambiguous_context_lists_candidates() {
        let err = ProxyError::AmbiguousFolder {
            parent: "P1".into(),
            name: "2025-10-29".into(),
            candidates: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Parent folder P1 has 2 folders named '2025-10-29'");
        assert_eq!(err.context()["candidates"], json!(["a", "b"]));
    }
}
