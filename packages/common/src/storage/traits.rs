use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// A time-limited URL granting read access to one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Key-addressed object storage for media assets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name used in logs and health output.
    fn backend(&self) -> &'static str;

    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let bytes = self.get(key).await?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Create a URL that grants read access to `key` for `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError>;

    /// Stable URL for objects that are publicly readable.
    fn public_url(&self, key: &str) -> String;
}
