use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BlobError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("blob storage unavailable: {0}")]
    Unavailable(String),
}

/// Blob storage collaborator for verification documents and photos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` under `path` and returns a download URL.
    async fn put(&self, path: &str, data: Bytes) -> Result<String, BlobError>;
}

pub struct MemoryBlobStore {
    base_url: String,
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: DashMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.blobs.get(path).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<String, BlobError> {
        self.blobs.insert(path.to_string(), data);
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
    }
}

pub fn verification_document_path(agent_id: uuid::Uuid, file_name: &str) -> String {
    format!("verificationDocuments/{agent_id}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_returns_url_under_base() {
        let blobs = MemoryBlobStore::new("memory://blobs/");
        let url = blobs
            .put("verificationDocuments/a/license.png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert_eq!(url, "memory://blobs/verificationDocuments/a/license.png");
        assert_eq!(
            blobs.get("verificationDocuments/a/license.png").unwrap(),
            Bytes::from_static(b"png")
        );
    }
}
