//! Folder resolution for `list_files`
//!
//! A folder is addressed either directly by id or by parent id plus exact
//! child name. Name lookup is split in two: [`select_child`] picks a match
//! from an already-listed set of children and has no I/O, [`resolve_folder`]
//! does the listing.

use relay_core::{FolderEntry, FolderId, FolderRef, ProxyError};
use relay_storage::{DriveBackend, StorageError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Why a folder reference could not be resolved
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("parent {parent} has no folder named '{name}'")]
    NoMatch { parent: FolderId, name: String },

    #[error("parent {parent} has {} folders named '{name}'", candidates.len())]
    Ambiguous {
        parent: FolderId,
        name: String,
        candidates: Vec<FolderId>,
    },

    #[error("parent folder {parent} is not accessible: {source}")]
    ParentInaccessible {
        parent: FolderId,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Upstream(StorageError),
}

impl From<ResolutionError> for ProxyError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NoMatch { parent, name } => ProxyError::FolderNameNotFound {
                parent: parent.to_string(),
                name,
            },
            ResolutionError::Ambiguous {
                parent,
                name,
                candidates,
            } => ProxyError::AmbiguousFolder {
                parent: parent.to_string(),
                name,
                candidates: candidates.into_iter().map(|id| id.to_string()).collect(),
            },
            ResolutionError::ParentInaccessible { parent, .. } => {
                ProxyError::PermissionOrNotFound(format!("Folder {parent}"))
            }
            ResolutionError::Upstream(source) => source.into(),
        }
    }
}

/// How the target folder was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    Direct,
    ByName,
}

/// A resolved folder reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub folder_id: FolderId,
    pub mode: ResolutionMode,
}

/// Pick the child whose name is exactly `name`.
///
/// Comparison is byte for byte: no trimming, case folding or prefix matching.
pub fn select_child(
    parent: &FolderId,
    children: &[FolderEntry],
    name: &str,
) -> Result<FolderId, ResolutionError> {
    let mut matches = children.iter().filter(|child| child.name == name);

    match (matches.next(), matches.next()) {
        (None, _) => Err(ResolutionError::NoMatch {
            parent: parent.clone(),
            name: name.to_string(),
        }),
        (Some(only), None) => Ok(only.id.clone()),
        (Some(first), Some(second)) => {
            let mut candidates = vec![first.id.clone(), second.id.clone()];
            candidates.extend(matches.map(|child| child.id.clone()));
            Err(ResolutionError::Ambiguous {
                parent: parent.clone(),
                name: name.to_string(),
                candidates,
            })
        }
    }
}

/// Turn a folder reference into a folder id.
///
/// Direct ids are returned without an existence check; the following drive
/// call reports a missing folder.
pub async fn resolve_folder(
    backend: &dyn DriveBackend,
    folder_ref: &FolderRef,
) -> Result<Resolved, ResolutionError> {
    match folder_ref {
        FolderRef::Direct(id) => Ok(Resolved {
            folder_id: id.clone(),
            mode: ResolutionMode::Direct,
        }),
        FolderRef::ByName { parent, name } => {
            let children = backend.list_folders(parent).await.map_err(|e| match e {
                StorageError::FolderNotFound(_) | StorageError::PermissionDenied(_) => {
                    ResolutionError::ParentInaccessible {
                        parent: parent.clone(),
                        source: e,
                    }
                }
                other => ResolutionError::Upstream(other),
            })?;

            debug!(
                parent = %parent,
                children = children.len(),
                "Resolving folder by name"
            );

            let folder_id = select_child(parent, &children, name)?;
            Ok(Resolved {
                folder_id,
                mode: ResolutionMode::ByName,
            })
        }
    }
}
