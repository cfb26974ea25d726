use chrono::{DateTime, Utc};
use common::ContentStatus;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{project, project_image};
use crate::error::AppError;
use crate::models::shared::{Issues, Pagination, check_len, check_url, double_option};

/// Request body for creating a portfolio project. New projects start as `DRAFT`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProjectRequest {
    #[schema(example = "Aurora brand film")]
    pub title: String,
    /// URL slug. Derived from the title when omitted.
    pub slug: Option<String>,
    /// One-paragraph summary (max 1000 characters).
    pub summary: Option<String>,
    /// Markdown case study.
    pub description: String,
    #[schema(example = "Aurora Energy")]
    pub client: Option<String>,
    #[schema(example = "commercial")]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

pub fn validate_create_project(payload: &CreateProjectRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    issues.check("title", check_len(&payload.title, "Title", 1, 256));
    issues.check(
        "description",
        check_len(&payload.description, "Description", 1, 100_000),
    );
    if let Some(summary) = &payload.summary {
        issues.check("summary", check_len(summary, "Summary", 0, 1000));
    }
    if let Some(client) = &payload.client {
        issues.check("client", check_len(client, "Client", 1, 128));
    }
    if let Some(category) = &payload.category {
        issues.check("category", check_len(category, "Category", 1, 64));
    }
    issues.finish()
}

/// Request body for updating a project. Omitted fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub summary: Option<Option<String>>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub client: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
    pub featured: Option<bool>,
}

pub fn validate_update_project(payload: &UpdateProjectRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if let Some(title) = &payload.title {
        issues.check("title", check_len(title, "Title", 1, 256));
    }
    if let Some(description) = &payload.description {
        issues.check("description", check_len(description, "Description", 1, 100_000));
    }
    if let Some(Some(summary)) = &payload.summary {
        issues.check("summary", check_len(summary, "Summary", 0, 1000));
    }
    if let Some(Some(client)) = &payload.client {
        issues.check("client", check_len(client, "Client", 1, 128));
    }
    if let Some(Some(category)) = &payload.category {
        issues.check("category", check_len(category, "Category", 1, 64));
    }
    issues.finish()
}

/// Attach an image to a project, either an uploaded asset or an external URL.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AddImageRequest {
    pub media_id: Option<Uuid>,
    pub url: Option<String>,
    pub alt_text: Option<String>,
    /// Sort position (>= 0). Appended at the end when omitted.
    pub position: Option<i32>,
}

pub fn validate_add_image(payload: &AddImageRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    match (&payload.media_id, &payload.url) {
        (None, None) => issues.add("media_id", "Either media_id or url is required"),
        (Some(_), Some(_)) => issues.add("url", "Provide media_id or url, not both"),
        (None, Some(url)) => issues.check("url", check_url(url)),
        (Some(_), None) => {}
    }
    if let Some(alt) = &payload.alt_text {
        issues.check("alt_text", check_len(alt, "Alt text", 0, 300));
    }
    if payload.position.is_some_and(|p| p < 0) {
        issues.add("position", "Position must be >= 0");
    }
    issues.finish()
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectImageResponse {
    pub id: i32,
    pub media_id: Option<Uuid>,
    pub url: String,
    pub alt_text: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl From<project_image::Model> for ProjectImageResponse {
    fn from(m: project_image::Model) -> Self {
        Self {
            id: m.id,
            media_id: m.media_id,
            url: m.url,
            alt_text: m.alt_text,
            position: m.position,
            created_at: m.created_at,
        }
    }
}

/// Full project including its ordered gallery.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectResponse {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub description: String,
    pub client: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub status: ContentStatus,
    pub author_id: Option<i32>,
    pub view_count: i64,
    pub images: Vec<ProjectImageResponse>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectResponse {
    pub fn new(m: project::Model, images: Vec<project_image::Model>) -> Self {
        Self {
            id: m.id,
            title: m.title,
            slug: m.slug,
            summary: m.summary,
            description: m.description,
            client: m.client,
            category: m.category,
            featured: m.featured,
            status: m.status,
            author_id: m.author_id,
            view_count: m.view_count,
            images: images.into_iter().map(Into::into).collect(),
            published_at: m.published_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Project without description or gallery, used in lists.
#[derive(Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct ProjectSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub client: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub status: ContentStatus,
    pub author_id: Option<i32>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing projects.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectListQuery {
    /// Page number (default: 1).
    pub page: Option<u64>,
    /// Items per page (default: 20, max: 100).
    pub per_page: Option<u64>,
    /// Case-insensitive title search.
    pub search: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    /// Status filter. Ignored for callers below EDITOR, who only see `PUBLISHED`.
    pub status: Option<ContentStatus>,
    /// Sort field: `published_at`, `created_at`, `view_count`, `title`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectListResponse {
    pub data: Vec<ProjectSummary>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Aggregate counters for the portfolio dashboard.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectStats {
    pub total: u64,
    pub drafts: u64,
    pub published: u64,
    pub archived: u64,
    pub featured: u64,
    pub total_views: i64,
    /// Five most viewed published projects.
    pub top_projects: Vec<ProjectSummary>,
    pub categories: Vec<CategoryCount>,
}
