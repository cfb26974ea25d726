mod error;
mod hash;
mod signing;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

use std::sync::Arc;

pub use error::StorageError;
pub use hash::ContentHash;
pub use signing::UrlSigner;
pub use traits::{BoxReader, ObjectStore, SignedUrl};

use crate::config::{StorageBackend, StorageConfig};
use filesystem::FilesystemObjectStore;

/// Validate an object key.
///
/// Keys are relative, slash-separated paths of `[A-Za-z0-9._-]` segments.
/// Empty segments, `.`/`..` segments and hidden segments are rejected.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.len() > 512 {
        return Err(StorageError::InvalidKey("key must be 1-512 characters".into()));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(StorageError::InvalidKey(
            "key must not start or end with '/'".into(),
        ));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment.starts_with('.') {
            return Err(StorageError::InvalidKey(format!(
                "invalid segment in key '{key}'"
            )));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(StorageError::InvalidKey(format!(
                "unsupported character in key '{key}'"
            )));
        }
    }
    Ok(())
}

/// Build the configured object store, or `None` when storage is disabled.
///
/// `signing_secret` keys the HMAC for filesystem URLs; `files_base_url` is the
/// public URL prefix under which the HTTP layer serves filesystem objects.
pub async fn from_config(
    config: &StorageConfig,
    signing_secret: &str,
    files_base_url: &str,
) -> Result<Option<Arc<dyn ObjectStore>>, StorageError> {
    match config.backend {
        StorageBackend::None => Ok(None),
        StorageBackend::Filesystem => {
            let secret = config
                .url_signing_secret
                .as_deref()
                .unwrap_or(signing_secret);
            let store = FilesystemObjectStore::new(
                config.filesystem.root.clone(),
                files_base_url,
                UrlSigner::new(secret),
            )
            .await?;
            Ok(Some(Arc::new(store)))
        }
        #[cfg(feature = "object-storage")]
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StorageError::Config("storage.s3 section is missing".into()))?;
            Ok(Some(Arc::new(s3::S3ObjectStore::new(s3)?)))
        }
        #[cfg(not(feature = "object-storage"))]
        StorageBackend::S3 => Err(StorageError::Config(
            "S3 backend requires the `object-storage` feature".into(),
        )),
    }
}
