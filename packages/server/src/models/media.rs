use chrono::{DateTime, Utc};
use common::MediaVisibility;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::media_asset;
use crate::error::AppError;
use crate::models::shared::{Issues, Pagination, check_len, double_option};

/// Stored media asset.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaResponse {
    pub id: Uuid,
    #[schema(example = "hero.jpg")]
    pub filename: String,
    #[schema(example = "image/jpeg")]
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
    /// SHA-256 hex digest of the content.
    pub checksum: String,
    pub visibility: MediaVisibility,
    pub alt_text: Option<String>,
    pub owner_id: Option<i32>,
    /// Direct URL for public assets. Private assets need `/media/{id}/signed-url`.
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MediaResponse {
    pub fn new(m: media_asset::Model, public_url: Option<String>) -> Self {
        Self {
            url: match m.visibility {
                MediaVisibility::Public => public_url,
                MediaVisibility::Private => None,
            },
            id: m.id,
            filename: m.filename,
            content_type: m.content_type,
            size: m.size,
            checksum: m.checksum,
            visibility: m.visibility,
            alt_text: m.alt_text,
            owner_id: m.owner_id,
            created_at: m.created_at,
        }
    }
}

/// Multipart upload body, for documentation only.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadMediaForm {
    /// The file to store.
    #[schema(format = Binary)]
    pub file: String,
    /// `public` (default) or `private`.
    pub visibility: Option<MediaVisibility>,
    pub alt_text: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateMediaRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub alt_text: Option<Option<String>>,
    pub visibility: Option<MediaVisibility>,
}

pub fn validate_alt_text(alt: Option<&str>) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if let Some(alt) = alt {
        issues.check("alt_text", check_len(alt, "Alt text", 0, 300));
    }
    issues.finish()
}

/// Query parameters for listing media.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaListQuery {
    /// Page number (default: 1).
    pub page: Option<u64>,
    /// Items per page (default: 20, max: 100).
    pub per_page: Option<u64>,
    /// Case-insensitive filename search.
    pub search: Option<String>,
    /// Exact type (`image/png`) or top-level prefix (`image`).
    pub content_type: Option<String>,
    pub visibility: Option<MediaVisibility>,
    /// Only assets uploaded by this user.
    pub owner_id: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaListResponse {
    pub data: Vec<MediaResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TypeUsage {
    /// Top-level MIME type, e.g. `image`.
    pub kind: String,
    pub count: u64,
    pub bytes: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaStats {
    pub count: u64,
    pub total_bytes: i64,
    pub public: u64,
    pub private: u64,
    pub by_type: Vec<TypeUsage>,
}

/// Query string of a signed file URL.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SignedFileQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}
