//! In-memory sliding-window rate limiting for sensitive auth endpoints.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::error::AppError;
use crate::extractors::client::client_ip;
use crate::state::AppState;

/// Per-key log of recent call instants.
#[derive(Default)]
pub struct RateLimiter {
    entries: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call for `key` if fewer than `max_requests` were recorded in
    /// the last `window_ms` milliseconds.
    pub fn allow(&self, key: &str, max_requests: u32, window_ms: u64) -> bool {
        self.check(key, max_requests, Duration::from_millis(window_ms))
            .is_ok()
    }

    /// Like [`allow`](Self::allow), but on rejection returns how long until a
    /// slot frees up.
    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> Result<(), Duration> {
        self.check_at(key, max_requests, window, Instant::now())
    }

    pub fn check_at(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut log = self.entries.entry(key.to_string()).or_default();
        while log
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= window)
        {
            log.pop_front();
        }

        if log.len() >= max_requests as usize {
            let retry = log
                .front()
                .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(window);
            return Err(retry);
        }

        log.push_back(now);
        Ok(())
    }

    /// Drop keys with no call inside `window`.
    pub fn cleanup(&self, window: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, log| {
            log.back()
                .is_some_and(|&t| now.saturating_duration_since(t) < window)
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically evict idle keys so the map does not grow without bound.
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>, window: Duration, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            limiter.cleanup(window);
        }
    });
}

/// Middleware for register, login, refresh and the token endpoints. Keyed by
/// request path and client IP as resolved by [`client_ip`].
pub async fn rate_limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cfg = &state.config.rate_limit;
    if !cfg.enabled {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(
        request.headers(),
        request.extensions(),
        &state.config.server.trusted_proxies,
    );
    let key = format!("{}:{}", request.uri().path(), ip);

    if let Err(retry) = state.rate_limiter.check(&key, cfg.max_requests, cfg.window()) {
        let retry_after = retry.as_secs_f64().ceil().max(1.0) as u64;
        warn!(ip = %ip, path = %request.uri().path(), retry_after, "Rate limit exceeded");
        return Err(AppError::RateLimited { retry_after });
    }

    Ok(next.run(request).await)
}
