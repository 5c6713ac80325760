//! Object storage port shared by the quality and privacy workflows.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Failure reported by an external collaborator (storage, vision, reasoning).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),
    #[error("object name escapes the asset root: {0}")]
    InvalidObjectName(String),
}

/// Descriptive metadata captured alongside retrieved image bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub size: usize,
    pub object_name: String,
    pub retrieved_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub metadata: ObjectMetadata,
}

pub trait ObjectStore: Send + Sync {
    fn get_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError>;

    /// Stores `bytes` and returns the location of the written object.
    fn put_object(
        &self,
        object_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Prepends the delivery prefix unless the name already carries it.
pub fn resolve_object_name(prefix: &str, object_name: &str) -> String {
    if prefix.is_empty() || object_name.starts_with(prefix) {
        object_name.to_string()
    } else {
        format!("{prefix}{object_name}")
    }
}

/// Serves delivery photos from a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    delivery_prefix: String,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, delivery_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            delivery_prefix: delivery_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `object_name` onto the root, refusing absolute names and `..`.
    fn confine(&self, object_name: &str) -> Result<PathBuf, CollaboratorError> {
        let relative = Path::new(object_name);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if object_name.is_empty() || !contained {
            return Err(CollaboratorError::InvalidObjectName(object_name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn locate(&self, object_name: &str) -> Result<Option<(PathBuf, String)>, CollaboratorError> {
        let direct = self.confine(object_name)?;
        if direct.is_file() {
            return Ok(Some((direct, object_name.to_string())));
        }

        let resolved = resolve_object_name(&self.delivery_prefix, object_name);
        let prefixed = self.confine(&resolved)?;
        Ok(prefixed.is_file().then_some((prefixed, resolved)))
    }
}

impl ObjectStore for LocalAssetStore {
    fn get_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError> {
        let (path, resolved) = self.locate(object_name)?.ok_or_else(|| {
            CollaboratorError::NotFound(format!(
                "{} under {}",
                resolve_object_name(&self.delivery_prefix, object_name),
                self.root.display()
            ))
        })?;

        let bytes = fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => CollaboratorError::NotFound(resolved.clone()),
            _ => CollaboratorError::Unavailable(format!("{}: {err}", path.display())),
        })?;

        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        debug!(object = %resolved, size = bytes.len(), "loaded local delivery asset");

        Ok(FetchedObject {
            metadata: ObjectMetadata {
                content_type,
                size: bytes.len(),
                object_name: resolved,
                retrieved_at: Utc::now(),
                source: "local".to_string(),
            },
            bytes,
        })
    }

    fn put_object(
        &self,
        object_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError> {
        let path = self.confine(object_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CollaboratorError::Unavailable(format!("{}: {err}", parent.display()))
            })?;
        }
        fs::write(&path, bytes)
            .map_err(|err| CollaboratorError::Unavailable(format!("{}: {err}", path.display())))?;

        debug!(object = object_name, content_type, size = bytes.len(), "stored local object");
        Ok(path.display().to_string())
    }
}
