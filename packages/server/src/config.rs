use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use common::config::{REDACTED, StorageConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used in emailed links and file URLs.
    pub public_url: String,
    pub cors: CorsConfig,
    /// Peers allowed to set `X-Forwarded-For`. Empty means the socket address
    /// is always used.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: u64,
    #[serde(default = "default_password_reset_ttl_secs")]
    pub password_reset_ttl_secs: u64,
    #[serde(default = "default_email_verification_ttl_secs")]
    pub email_verification_ttl_secs: u64,
    /// Seeded as SUPER_ADMIN on startup when both are set.
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

fn default_access_token_ttl_secs() -> u64 {
    15 * 60
}
fn default_refresh_token_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}
fn default_password_reset_ttl_secs() -> u64 {
    60 * 60
}
fn default_email_verification_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &REDACTED)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("password_reset_ttl_secs", &self.password_reset_ttl_secs)
            .field("email_verification_ttl_secs", &self.email_verification_ttl_secs)
            .field("bootstrap_admin_email", &self.bootstrap_admin_email)
            .field(
                "bootstrap_admin_password",
                &self.bootstrap_admin_password.as_ref().map(|_| REDACTED),
            )
            .finish()
    }
}

impl AuthConfig {
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            password_reset_ttl_secs: default_password_reset_ttl_secs(),
            email_verification_ttl_secs: default_email_verification_ttl_secs(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Allowed calls per key within the window. Default: 5.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window length in milliseconds. Default: 60000.
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_rate_limit_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_rate_limit_enabled() -> bool {
    true
}
fn default_rate_limit_max_requests() -> u32 {
    5
}
fn default_rate_limit_window_ms() -> u64 {
    60_000
}
fn default_rate_limit_cleanup_interval_secs() -> u64 {
    300
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_rate_limit_max_requests(),
            window_ms: default_rate_limit_window_ms(),
            cleanup_interval_secs: default_rate_limit_cleanup_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Largest accepted upload in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_allowed_content_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/svg+xml",
        "video/mp4",
        "video/webm",
        "application/pdf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://127.0.0.1:3000")?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "postgres://localhost/studio")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., STUDIO__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("STUDIO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .with_list_parse_key("server.trusted_proxies")
                    .with_list_parse_key("media.allowed_content_types")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        if config.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".into()));
        }
        Ok(config)
    }

    /// Secret keying filesystem URL signatures.
    pub fn url_signing_secret(&self) -> &str {
        self.storage
            .url_signing_secret
            .as_deref()
            .unwrap_or(&self.auth.jwt_secret)
    }

    /// URL prefix under which filesystem media objects are served.
    pub fn media_files_url(&self) -> String {
        format!(
            "{}/api/v1/media/files",
            self.server.public_url.trim_end_matches('/')
        )
    }
}
