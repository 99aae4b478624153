//! Action protocol
//!
//! A request body is a JSON object with an `action` field plus the fields
//! that action needs. Decoding happens in two steps: the action name picks
//! one variant of [`ProxyRequest`], then the whole object is deserialized
//! into that variant's parameter struct. Nothing is dispatched until both
//! steps succeed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProxyError, Result};
use crate::model::FolderId;

/// Action name used when the request carries no `action` field
pub const DEFAULT_ACTION: &str = "default";

/// The closed set of actions the relay executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TestConnection,
    CreateFolder,
    UploadFile,
    ListFolders,
    ListFiles,
    DownloadFile,
    DeleteFile,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::TestConnection,
        ActionKind::CreateFolder,
        ActionKind::UploadFile,
        ActionKind::ListFolders,
        ActionKind::ListFiles,
        ActionKind::DownloadFile,
        ActionKind::DeleteFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::TestConnection => "test_connection",
            ActionKind::CreateFolder => "create_folder",
            ActionKind::UploadFile => "upload_file",
            ActionKind::ListFolders => "list_folders",
            ActionKind::ListFiles => "list_files",
            ActionKind::DownloadFile => "download_file",
            ActionKind::DeleteFile => "delete_file",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProxyError::UnsupportedAction(s.to_string()))
    }
}

/// `test_connection` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConnectionParams {
    pub folder_id: String,
}

/// `create_folder` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolderParams {
    pub parent_id: String,
    pub folder_name: String,
}

/// `upload_file` parameters
#[derive(Clone, Serialize, Deserialize)]
pub struct UploadFileParams {
    pub folder_id: String,
    pub filename: String,
    /// Transport-encoded file body (base64 or a base64 data URL)
    pub content: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

// Content stays out of Debug output so request logging cannot leak it.
impl fmt::Debug for UploadFileParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFileParams")
            .field("folder_id", &self.folder_id)
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// `list_folders` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFoldersParams {
    pub parent_id: String,
}

/// `list_files` parameters: a direct id, or a parent id plus child name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilesParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

impl ListFilesParams {
    /// Pick the addressing mode.
    ///
    /// A non-empty `folder_id` always wins, even when a parent and name are
    /// also supplied.
    pub fn folder_ref(&self) -> Result<FolderRef> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }

        if let Some(id) = present(&self.folder_id) {
            return Ok(FolderRef::Direct(FolderId::new(id)));
        }

        match (present(&self.parent_folder_id), present(&self.folder_name)) {
            (Some(parent), Some(name)) => Ok(FolderRef::ByName {
                parent: FolderId::new(parent),
                name: name.to_string(),
            }),
            _ => Err(ProxyError::InvalidRequest(
                "list_files requires folder_id or both parent_folder_id and folder_name".into(),
            )),
        }
    }
}

/// `download_file` / `delete_file` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileParams {
    pub file_id: String,
}

/// How a request addresses its target folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderRef {
    /// Use this id verbatim
    Direct(FolderId),
    /// Look up the child of `parent` whose name is exactly `name`
    ByName { parent: FolderId, name: String },
}

/// A decoded, typed request
#[derive(Debug, Clone)]
pub enum ProxyRequest {
    TestConnection(TestConnectionParams),
    CreateFolder(CreateFolderParams),
    UploadFile(UploadFileParams),
    ListFolders(ListFoldersParams),
    ListFiles(ListFilesParams),
    DownloadFile(FileParams),
    DeleteFile(FileParams),
}

impl ProxyRequest {
    pub fn action(&self) -> ActionKind {
        match self {
            ProxyRequest::TestConnection(_) => ActionKind::TestConnection,
            ProxyRequest::CreateFolder(_) => ActionKind::CreateFolder,
            ProxyRequest::UploadFile(_) => ActionKind::UploadFile,
            ProxyRequest::ListFolders(_) => ActionKind::ListFolders,
            ProxyRequest::ListFiles(_) => ActionKind::ListFiles,
            ProxyRequest::DownloadFile(_) => ActionKind::DownloadFile,
            ProxyRequest::DeleteFile(_) => ActionKind::DeleteFile,
        }
    }

    /// Decode a raw request body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ProxyError::InvalidRequest(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Decode an already-parsed request object
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ProxyError::InvalidRequest(
                "request body must be a JSON object".into(),
            ));
        }

        let action: ActionKind = requested_action(&value)?.parse()?;

        Ok(match action {
            ActionKind::TestConnection => ProxyRequest::TestConnection(params(action, value)?),
            ActionKind::CreateFolder => ProxyRequest::CreateFolder(params(action, value)?),
            ActionKind::UploadFile => ProxyRequest::UploadFile(params(action, value)?),
            ActionKind::ListFolders => ProxyRequest::ListFolders(params(action, value)?),
            ActionKind::ListFiles => ProxyRequest::ListFiles(params(action, value)?),
            ActionKind::DownloadFile => ProxyRequest::DownloadFile(params(action, value)?),
            ActionKind::DeleteFile => ProxyRequest::DeleteFile(params(action, value)?),
        })
    }
}

/// The `action` field of a request object, or [`DEFAULT_ACTION`] when absent
pub fn requested_action(value: &Value) -> Result<&str> {
    match value.get("action") {
        None | Some(Value::Null) => Ok(DEFAULT_ACTION),
        Some(Value::String(name)) => Ok(name),
        Some(_) => Err(ProxyError::InvalidField {
            field: "action",
            reason: "must be a string".into(),
        }),
    }
}

fn params<T: serde::de::DeserializeOwned>(action: ActionKind, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ProxyError::InvalidRequest(format!("invalid fields for {action}: {e}")))
}
