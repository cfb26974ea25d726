use chrono::{DateTime, Utc};
use common::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{session, user};
use crate::error::AppError;
use crate::models::blog::PostResponse;
use crate::models::media::MediaResponse;
use crate::models::project::ProjectResponse;
use crate::models::shared::{Issues, Pagination, check_len, check_url, double_option};

/// Public view of a user account. Never carries the password hash.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "ada@studio.example")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            name: m.name,
            avatar_url: m.avatar_url,
            bio: m.bio,
            role: m.role,
            email_verified: m.email_verified_at.is_some(),
            email_verified_at: m.email_verified_at,
            last_login_at: m.last_login_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Request body for `PUT /users/me`. Omitted fields are left unchanged;
/// `null` clears nullable fields.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub bio: Option<Option<String>>,
}

pub fn validate_update_profile(payload: &UpdateProfileRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if let Some(name) = &payload.name {
        issues.check("name", check_len(name, "Name", 1, 100));
    }
    if let Some(Some(url)) = &payload.avatar_url {
        issues.check("avatar_url", check_url(url));
    }
    if let Some(Some(bio)) = &payload.bio {
        issues.check("bio", check_len(bio, "Bio", 0, 2000));
    }
    issues.finish()
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ChangeRoleRequest {
    #[schema(example = "EDITOR")]
    pub role: Role,
}

/// Query parameters for listing users.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Page number (default: 1).
    pub page: Option<u64>,
    /// Items per page (default: 20, max: 100).
    pub per_page: Option<u64>,
    /// Case-insensitive match on email or name.
    pub search: Option<String>,
    /// Only users with this role.
    pub role: Option<Role>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: Pagination,
}

/// A login session as shown to its owner.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub family_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<session::Model> for SessionResponse {
    fn from(m: session::Model) -> Self {
        Self {
            id: m.id,
            family_id: m.family_id,
            ip_address: m.ip_address,
            user_agent: m.user_agent,
            created_at: m.created_at,
            expires_at: m.expires_at,
            revoked_at: m.revoked_at,
        }
    }
}

/// Everything stored about the caller.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserExport {
    pub user: UserResponse,
    pub sessions: Vec<SessionResponse>,
    pub posts: Vec<PostResponse>,
    pub projects: Vec<ProjectResponse>,
    pub media: Vec<MediaResponse>,
    pub exported_at: DateTime<Utc>,
}
