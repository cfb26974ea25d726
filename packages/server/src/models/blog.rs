use chrono::{DateTime, Utc};
use common::ContentStatus;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::entity::blog_post;
use crate::error::AppError;
use crate::models::shared::{Issues, Pagination, check_len, check_url, double_option};

pub const MAX_TAGS: usize = 20;

/// Request body for creating a blog post. New posts start as `DRAFT`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreatePostRequest {
    /// Post title (1-256 characters).
    #[schema(example = "Behind the scenes of our latest shoot")]
    pub title: String,
    /// URL slug. Derived from the title when omitted.
    #[schema(example = "behind-the-scenes")]
    pub slug: Option<String>,
    /// Short teaser (max 500 characters).
    pub excerpt: Option<String>,
    /// Markdown body.
    pub content: String,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    #[schema(example = json!(["production", "film"]))]
    pub tags: Vec<String>,
}

pub fn validate_create_post(payload: &CreatePostRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    issues.check("title", check_len(&payload.title, "Title", 1, 256));
    issues.check("content", check_content(&payload.content));
    if let Some(excerpt) = &payload.excerpt {
        issues.check("excerpt", check_len(excerpt, "Excerpt", 0, 500));
    }
    if let Some(url) = &payload.cover_image_url {
        issues.check("cover_image_url", check_url(url));
    }
    issues.check("tags", check_tags(&payload.tags));
    issues.finish()
}

/// Request body for updating a post. Omitted fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub cover_image_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

pub fn validate_update_post(payload: &UpdatePostRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if let Some(title) = &payload.title {
        issues.check("title", check_len(title, "Title", 1, 256));
    }
    if let Some(content) = &payload.content {
        issues.check("content", check_content(content));
    }
    if let Some(Some(excerpt)) = &payload.excerpt {
        issues.check("excerpt", check_len(excerpt, "Excerpt", 0, 500));
    }
    if let Some(Some(url)) = &payload.cover_image_url {
        issues.check("cover_image_url", check_url(url));
    }
    if let Some(tags) = &payload.tags {
        issues.check("tags", check_tags(tags));
    }
    issues.finish()
}

fn check_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Content must not be empty".into());
    }
    if content.len() > 200_000 {
        return Err("Content must be at most 200000 bytes".into());
    }
    Ok(())
}

/// Tags: at most 20, each 1-50 characters of lowercase letters, digits,
/// spaces or hyphens after normalisation.
pub fn check_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > MAX_TAGS {
        return Err(format!("At most {MAX_TAGS} tags are allowed"));
    }
    for tag in tags {
        let tag = normalize_tag(tag);
        if tag.is_empty() || tag.chars().count() > 50 {
            return Err("Each tag must be 1-50 characters".into());
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == ' ')
        {
            return Err(format!("Tag '{tag}' may only contain letters, digits, spaces and hyphens"));
        }
    }
    Ok(())
}

pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Normalised, de-duplicated tags in first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| normalize_tag(t)) {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Full blog post.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PostResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub author_id: Option<i32>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn tags_from_json(value: &serde_json::Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

impl From<blog_post::Model> for PostResponse {
    fn from(m: blog_post::Model) -> Self {
        Self {
            tags: tags_from_json(&m.tags),
            id: m.id,
            title: m.title,
            slug: m.slug,
            excerpt: m.excerpt,
            content: m.content,
            cover_image_url: m.cover_image_url,
            status: m.status,
            author_id: m.author_id,
            view_count: m.view_count,
            published_at: m.published_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Blog post without its body, used in lists.
#[derive(Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct PostSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub tags: serde_json::Value,
    pub status: ContentStatus,
    pub author_id: Option<i32>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing posts.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostListQuery {
    /// Page number (default: 1).
    pub page: Option<u64>,
    /// Items per page (default: 20, max: 100).
    pub per_page: Option<u64>,
    /// Case-insensitive title search.
    pub search: Option<String>,
    /// Only posts carrying this tag.
    pub tag: Option<String>,
    /// Status filter. Ignored for callers below EDITOR, who only see `PUBLISHED`.
    pub status: Option<ContentStatus>,
    /// Sort field: `published_at`, `created_at`, `view_count`, `title`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PostListResponse {
    pub data: Vec<PostSummary>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Aggregate counters for the blog dashboard.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BlogStats {
    pub total: u64,
    pub drafts: u64,
    pub published: u64,
    pub archived: u64,
    pub total_views: i64,
    /// Five most viewed published posts.
    pub top_posts: Vec<PostSummary>,
    /// Tag usage across published posts, most used first.
    pub tags: Vec<TagCount>,
}
