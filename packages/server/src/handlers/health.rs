use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::models::shared::ApiOk;
use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    #[schema(example = "ok")]
    pub status: &'static str,
    pub database: bool,
    /// Name of the configured storage backend, if any.
    #[schema(example = "filesystem")]
    pub storage: Option<&'static str>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "health",
    summary = "Liveness and dependency check",
    description = "Pings the database. Answers 503 when it is unreachable.",
    responses(
        (status = 200, description = "Healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database ping failed");
            false
        }
    };
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        storage: state.storage.as_ref().map(|s| s.backend()),
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiOk::new(body)))
}
