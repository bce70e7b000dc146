//! Asset publication seams and the filesystem-backed store.
//!
//! The publisher and the session-asset lister are external collaborators
//! owned by the host and appear here only as trait seams. [`FsAssetStore`] is
//! the bundled publisher for hosts that have no remote store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::domain::data_uri::DataUri;

/// Errors raised while publishing a payload to an asset store.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("asset store rejected the payload: {message}")]
    Rejected { message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Errors raised while listing the current session's assets.
#[derive(Debug, Error)]
pub enum SessionAssetError {
    #[error("session asset listing failed: {message}")]
    Listing { message: String },
}

impl SessionAssetError {
    pub fn listing(message: impl Into<String>) -> Self {
        Self::Listing {
            message: message.into(),
        }
    }
}

/// One session-scoped file as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAsset {
    pub name: String,
    pub data_uri: String,
}

/// Opaque store that turns a payload into a durable reference. The reference
/// is owned by the store once returned.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    async fn publish(&self, payload: &DataUri) -> Result<String, PublishError>;
}

/// Read-only listing of the files produced during the current session.
#[async_trait]
pub trait SessionAssetSource: Send + Sync {
    async fn list_session_assets(
        &self,
        include_name: bool,
        include_data: bool,
    ) -> Result<Vec<SessionAsset>, SessionAssetError>;
}

/// Filesystem-backed publisher. Payloads are stored under
/// `{uuid}-{sanitized filename}` inside the configured root; the stored path
/// doubles as the opaque reference.
#[derive(Debug)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Initialise the store rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Read a previously published payload back by its reference.
    pub async fn read(&self, reference: &str) -> Result<Vec<u8>, PublishError> {
        let absolute = self.resolve(reference)?;
        Ok(fs::read(absolute).await?)
    }

    fn build_stored_path(&self, filename: &str) -> String {
        format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename))
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, PublishError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(PublishError::rejected("invalid stored path"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetPublisher for FsAssetStore {
    async fn publish(&self, payload: &DataUri) -> Result<String, PublishError> {
        let filename = payload.filename().unwrap_or("asset");
        let stored_path = self.build_stored_path(filename);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, payload.payload()).await?;

        let checksum = hex::encode(Sha256::digest(payload.payload()));
        info!(
            reference = %stored_path,
            size_bytes = payload.payload().len(),
            %checksum,
            "published asset"
        );
        Ok(stored_path)
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .map(slugify)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "asset".to_string());

    match path.extension().and_then(|value| value.to_str()) {
        Some(ext) => format!("{stem}.{}", ext.to_ascii_lowercase()),
        None => stem,
    }
}
