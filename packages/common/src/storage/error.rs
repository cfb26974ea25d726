/// Errors that can occur during object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),
    /// The object key is empty, absolute, or escapes the store root.
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    /// The provided content hash is invalid.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
    /// The storage configuration is incomplete or inconsistent.
    #[error("storage misconfigured: {0}")]
    Config(String),
    /// The remote backend rejected or failed the request.
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}
