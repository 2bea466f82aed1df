//! Filesystem blob store.
//!
//! Blobs live as flat files under a configured root directory; the
//! reference is the file name. Download URLs are served by the static
//! file route fronting the same directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use restyle_core::contracts::{BlobError, BlobStore};

/// Local-disk [`BlobStore`].
pub struct FsBlobStore {
    root: PathBuf,
    /// Public base URL the blob route is mounted at, e.g.
    /// `http://localhost:3000/blobs`.
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))
    }

    /// References are generated file names; reject anything that could
    /// escape the root directory.
    fn path_for(&self, blob_ref: &str) -> Result<PathBuf, BlobError> {
        let name = Path::new(blob_ref);
        if blob_ref.is_empty() || name.components().count() != 1 {
            return Err(BlobError::NotFound(blob_ref.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(blob_ref)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BlobError::NotFound(blob_ref.to_string())
            } else {
                BlobError::Io(e.to_string())
            }
        })
    }

    async fn store(&self, bytes: &[u8]) -> Result<String, BlobError> {
        let blob_ref = format!("{}.bin", Uuid::new_v4());
        let path = self.root.join(&blob_ref);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(blob_ref)
    }

    async fn signed_download_url(&self, blob_ref: &str) -> Result<String, BlobError> {
        let path = self.path_for(blob_ref)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(format!("{}/{blob_ref}", self.public_base_url)),
            Ok(false) => Err(BlobError::NotFound(blob_ref.to_string())),
            Err(e) => Err(BlobError::Io(e.to_string())),
        }
    }

    async fn delete(&self, blob_ref: &str) -> Result<(), BlobError> {
        let path = self.path_for(blob_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e.to_string())),
        }
    }
}
