use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::BufReader;

use super::error::StorageError;
use super::signing::UrlSigner;
use super::traits::{BoxReader, ObjectStore, SignedUrl};
use super::validate_key;

/// Filesystem-backed object store.
///
/// Objects live at `{root}/{key}`. Writes go to `{root}/.tmp` first and are
/// renamed into place, so readers never observe a partially written object.
/// Objects are served back by the HTTP layer under `base_url`, with private
/// ones gated by an HMAC signature.
pub struct FilesystemObjectStore {
    root: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

impl FilesystemObjectStore {
    /// Create a new filesystem store rooted at `root`.
    pub async fn new(
        root: PathBuf,
        base_url: impl Into<String>,
        signer: UrlSigner,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let object_path = self.object_path(key)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::debug!(error = %cleanup, path = %temp_path.display(), "Temp file cleanup failed");
            }
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::read(&object_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::File::open(&object_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(key)?;
        Ok(fs::try_exists(&object_path).await?)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        validate_key(key)?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Config(format!("signed URL TTL out of range: {e}")))?;
        let expires_at = Utc::now() + ttl;
        let expires = expires_at.timestamp();
        let signature = self.signer.sign(key, expires)?;

        Ok(SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                self.base_url, key, expires, signature
            ),
            expires_at,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
