use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob rejected: {0}")]
    Rejected(String),
}

/// External object storage for uploaded images. Only the URL it hands back
/// is persisted.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return its public URL.
    async fn store(&self, filename: &str, content_type: &str, data: &[u8]) -> Result<String, BlobError>;

    /// Delete a previously stored blob by the URL `store` returned.
    async fn remove(&self, url: &str) -> Result<(), BlobError>;
}

/// Blob store backed by a local directory that the server exposes under a
/// public base URL.
///
/// Each blob is a flat file named `{uuid}_{sanitized filename}`.
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> Result<Self, BlobError> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn object_name_from_url<'a>(&self, url: &'a str) -> Result<&'a str, BlobError> {
        let name = url
            .strip_prefix(&self.public_base)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| BlobError::Rejected(format!("not a local blob url: {}", url)))?;

        // Validate to prevent path traversal
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(BlobError::Rejected(format!("bad object name: {}", name)));
        }
        Ok(name)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, filename: &str, content_type: &str, data: &[u8]) -> Result<String, BlobError> {
        let object_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename));
        let path = self.dir.join(&object_name);

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        debug!("Stored {} ({} bytes, {})", object_name, data.len(), content_type);
        Ok(format!("{}/{}", self.public_base, object_name))
    }

    async fn remove(&self, url: &str) -> Result<(), BlobError> {
        let name = self.object_name_from_url(url)?;
        fs::remove_file(self.dir.join(name)).await?;
        debug!("Removed blob {}", name);
        Ok(())
    }
}

/// Reduce a client-supplied filename to `[A-Za-z0-9._-]`, never starting
/// with a dot.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers may send a full path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_hostile_names() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\my design.png"), "my_design.png");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("日本.png"), "png");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn store_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost/uploads/")
            .await
            .unwrap();

        let url = store.store("a b.png", "image/png", b"\x89PNG").await.unwrap();
        assert!(url.starts_with("http://localhost/uploads/"));
        assert!(url.ends_with("_a_b.png"));

        let name = url.rsplit('/').next().unwrap();
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"\x89PNG");

        store.remove(&url).await.unwrap();
        assert!(!dir.path().join(name).exists());
    }

    #[tokio::test]
    async fn remove_rejects_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost/uploads")
            .await
            .unwrap();

        assert!(matches!(
            store.remove("http://elsewhere/x.png").await,
            Err(BlobError::Rejected(_))
        ));
        assert!(matches!(
            store.remove("http://localhost/uploads/../secret").await,
            Err(BlobError::Rejected(_))
        ));
    }
}
