use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    domain::ResourceType,
    error::{AppError, Result},
};

/// Hex-encoded sha256 of the file content; the dedup key for attachments.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Store-relative key, e.g. "<announcement_id>/<uuid>.pdf".
    pub public_id: String,
    pub resource_type: ResourceType,
}

/// The blob-store collaborator attachments are written to. The local
/// filesystem implementation below is the default; deployments can swap
/// in an object-store client behind the same trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, announcement_id: Uuid, original_name: &str, data: &[u8]) -> Result<StoredBlob>;
    async fn delete(&self, public_id: &str) -> Result<()>;
}

pub struct LocalBlobStore {
    root: PathBuf,
    max_file_size: usize,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size_mb: usize) -> Self {
        Self {
            root: root.into(),
            max_file_size: max_file_size_mb * 1024 * 1024,
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, announcement_id: Uuid, original_name: &str, data: &[u8]) -> Result<StoredBlob> {
        if data.is_empty() {
            return Err(AppError::Validation("Empty file".to_string()));
        }
        if data.len() > self.max_file_size {
            return Err(AppError::Validation(format!(
                "File too large (max {} MB)",
                self.max_file_size / (1024 * 1024)
            )));
        }

        let extension = original_name
            .rsplit('.')
            .next()
            .filter(|ext| !ext.is_empty() && ext.len() <= 10)
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let resource_type = ResourceType::from_extension(&extension);

        // Keys are scoped by announcement so a hard delete of the
        // aggregate can sweep one directory.
        let dir = self.root.join(announcement_id.to_string());
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Internal(format!("Failed to create uploads directory: {}", e))
        })?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        let path = dir.join(&filename);

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;
        file.write_all(data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;

        Ok(StoredBlob {
            public_id: format!("{}/{}", announcement_id, filename),
            resource_type,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        // Keys are always "<uuid>/<uuid>.<ext>"; anything else is not ours.
        if public_id.contains("..") {
            return Ok(());
        }

        let path = self.root.join(public_id);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete file: {}", e)))?;
        }

        Ok(())
    }
}

/// Rejects puts whose name carries the poison marker and delegates the
/// rest to a real local store; test fixture for partial batch failures.
#[cfg(any(test, feature = "test-utils"))]
pub struct FlakyBlobStore {
    inner: LocalBlobStore,
}

#[cfg(any(test, feature = "test-utils"))]
impl FlakyBlobStore {
    pub const POISON: &'static str = "fail-me";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalBlobStore::new(root, 10),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, announcement_id: Uuid, original_name: &str, data: &[u8]) -> Result<StoredBlob> {
        if original_name.contains(Self::POISON) {
            return Err(AppError::Internal("blob store unavailable".to_string()));
        }
        self.inner.put(announcement_id, original_name, data).await
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        self.inner.delete(public_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_hashes_identically() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[tokio::test]
    async fn put_classifies_and_delete_is_idempotent() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("bullhorn-test-{}", Uuid::new_v4()));
        let store = LocalBlobStore::new(&dir, 1);
        let announcement_id = Uuid::new_v4();

        let image = store.put(announcement_id, "team.png", b"fake-png").await?;
        assert_eq!(image.resource_type, ResourceType::Image);

        let doc = store.put(announcement_id, "policy.pdf", b"fake-pdf").await?;
        assert_eq!(doc.resource_type, ResourceType::Raw);

        store.delete(&doc.public_id).await?;
        // Already gone; still fine.
        store.delete(&doc.public_id).await?;

        fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
