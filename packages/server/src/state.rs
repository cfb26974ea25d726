use std::sync::Arc;

use axum::extract::FromRef;
use common::storage::{ObjectStore, UrlSigner};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::rate_limit::RateLimiter;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub jwt: JwtKeys,
    /// `None` when no storage backend is configured; media endpoints then
    /// answer 503.
    pub storage: Option<Arc<dyn ObjectStore>>,
    /// Verifies signatures on `/media/files` URLs served by this process.
    pub file_signer: UrlSigner,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
