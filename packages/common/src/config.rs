use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Which object store backs the media library.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// No store; media endpoints answer 503.
    None,
    #[default]
    Filesystem,
    S3,
}

/// Placeholder printed instead of secrets in `Debug` output.
pub const REDACTED: &str = "[redacted]";

/// App-level object storage configuration.
#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub s3: Option<S3Config>,
    /// Lifetime of signed URLs in seconds. Default: 900.
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,
    /// Secret for filesystem URL signatures. Falls back to the JWT secret.
    #[serde(default)]
    pub url_signing_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemConfig {
    /// Directory holding stored objects. Default: "./data/media".
    #[serde(default = "default_filesystem_root")]
    pub root: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub path_style: bool,
    /// CDN or bucket URL used for public objects.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("filesystem", &self.filesystem)
            .field("s3", &self.s3)
            .field("signed_url_ttl_secs", &self.signed_url_ttl_secs)
            .field(
                "url_signing_secret",
                &self.url_signing_secret.as_ref().map(|_| REDACTED),
            )
            .finish()
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| REDACTED))
            .field("path_style", &self.path_style)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

fn default_signed_url_ttl_secs() -> u64 {
    900
}
fn default_filesystem_root() -> PathBuf {
    PathBuf::from("./data/media")
}
fn default_s3_region() -> String {
    "us-east-1".into()
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: default_filesystem_root(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            filesystem: FilesystemConfig::default(),
            s3: None,
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            url_signing_secret: None,
        }
    }
}
