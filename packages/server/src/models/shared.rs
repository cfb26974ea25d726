use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, FieldIssue};

/// Success envelope: `{ "success": true, ...payload }`.
#[derive(Serialize)]
pub struct ApiOk<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> ApiOk<T> {
    pub fn new(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

impl<T: Serialize> ApiOk<Data<T>> {
    /// `{ "success": true, "data": ... }`
    pub fn data(data: T) -> Self {
        Self::new(Data { data })
    }
}

/// Wrapper for payloads that are a single object under `data`.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Data<T> {
    pub data: T,
}

/// Plain acknowledgement payload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pagination metadata included in list responses.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 20)]
    pub per_page: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 3)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}

/// Clamp raw page parameters: page >= 1, per_page in 1..=100 (default 20).
pub fn page_params(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    (
        Ord::max(page.unwrap_or(1), 1),
        per_page.unwrap_or(20).clamp(1, 100),
    )
}

/// `asc` or anything else (descending).
pub fn sort_order(raw: Option<&str>) -> sea_orm::Order {
    if raw == Some("asc") {
        sea_orm::Order::Asc
    } else {
        sea_orm::Order::Desc
    }
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Collects field issues so a request reports every problem at once.
#[derive(Default)]
pub struct Issues(Vec<FieldIssue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldIssue {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record `check`'s error message under `field`.
    pub fn check(&mut self, field: &str, check: Result<(), String>) {
        if let Err(message) = check {
            self.add(field, message);
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidInput(self.0))
        }
    }
}

pub fn check_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() || email.len() > 254 {
        return Err("Email must be 1-254 characters".into());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email is invalid".into());
    };
    if local.is_empty()
        || domain.len() < 3
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
    {
        return Err("Email is invalid".into());
    }
    Ok(())
}

pub fn check_password(password: &str) -> Result<(), String> {
    if password.len() < 8 || password.len() > 128 {
        return Err("Password must be 8-128 characters".into());
    }
    Ok(())
}

/// Trimmed length between `min` and `max` Unicode characters.
pub fn check_len(value: &str, label: &str, min: usize, max: usize) -> Result<(), String> {
    let n = value.trim().chars().count();
    if n < min || n > max {
        return Err(format!("{label} must be {min}-{max} characters"));
    }
    Ok(())
}

/// Absolute http(s) URL or a root-relative path.
pub fn check_url(url: &str) -> Result<(), String> {
    let url = url.trim();
    if url.len() > 2048 {
        return Err("URL must be at most 2048 characters".into());
    }
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err("URL must not contain whitespace".into());
        }
        Ok(())
    } else {
        Err("URL must be absolute (http/https) or start with '/'".into())
    }
}

/// Normalise an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
