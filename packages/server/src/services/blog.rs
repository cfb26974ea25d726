use std::collections::HashMap;

use chrono::Utc;
use common::{ContentStatus, Role};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Alias, Func, LikeExpr};
use sea_orm::*;
use tracing::info;

use crate::entity::blog_post;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::blog::*;
use crate::models::shared::{Pagination, escape_like, page_params, sort_order};
use crate::services::content::{self, ensure_editable, map_write_error, summary_select};
use crate::services::user::find_account;
use crate::utils::slug::{resolve_slug, validate_slug};

pub struct BlogService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> BlogService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Paginated listing. Callers below EDITOR only see published posts.
    pub async fn list(&self, query: &PostListQuery, staff: bool) -> Result<PostListResponse, AppError> {
        let (page, per_page) = page_params(query.page, query.per_page);

        let mut select = blog_post::Entity::find();

        if !staff {
            select = select.filter(blog_post::Column::Status.eq(ContentStatus::Published));
        } else if let Some(status) = query.status {
            select = select.filter(blog_post::Column::Status.eq(status));
        }

        if let Some(ref search) = query.search {
            let term = escape_like(search.trim());
            if !term.is_empty() {
                select = select.filter(
                    Expr::expr(Func::lower(Expr::col(blog_post::Column::Title)))
                        .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
                );
            }
        }

        if let Some(ref tag) = query.tag {
            let tag = normalize_tag(tag);
            if !tag.is_empty() {
                // Tags are stored as a compact JSON array of strings.
                let needle = format!("%\"{}\"%", escape_like(&tag));
                select = select.filter(
                    Expr::col(blog_post::Column::Tags)
                        .cast_as(Alias::new("text"))
                        .like(LikeExpr::new(needle).escape('\\')),
                );
            }
        }

        let default_sort = if staff { "created_at" } else { "published_at" };
        let sort_column = match query.sort_by.as_deref().unwrap_or(default_sort) {
            "published_at" => blog_post::Column::PublishedAt,
            "created_at" => blog_post::Column::CreatedAt,
            "view_count" => blog_post::Column::ViewCount,
            "title" => blog_post::Column::Title,
            _ => {
                return Err(AppError::Validation(
                    "sort_by must be one of: published_at, created_at, view_count, title".into(),
                ));
            }
        };

        let total = select.clone().paginate(self.conn, per_page).num_items().await?;

        let data = summary_select(select)
            .order_by(sort_column, sort_order(query.sort_order.as_deref()))
            .order_by(blog_post::Column::Id, Order::Desc)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .into_model::<PostSummary>()
            .all(self.conn)
            .await?;

        Ok(PostListResponse {
            data,
            pagination: Pagination::new(page, per_page, total),
        })
    }

    /// Unpublished posts are reported as missing to callers below EDITOR.
    pub async fn get(&self, id: i32, staff: bool) -> Result<blog_post::Model, AppError> {
        let post = self.find(id).await?;
        if !staff && post.status != ContentStatus::Published {
            return Err(AppError::NotFound("Post not found".into()));
        }
        Ok(post)
    }

    /// Public read by slug; counts a view for published posts.
    pub async fn get_by_slug(&self, slug: &str, staff: bool) -> Result<blog_post::Model, AppError> {
        let mut post = content::find_by_slug::<blog_post::Entity, _>(self.conn, slug).await?;

        if post.status != ContentStatus::Published {
            if staff {
                return Ok(post);
            }
            return Err(AppError::NotFound("Post not found".into()));
        }

        content::record_view::<blog_post::Entity, _>(self.conn, post.id).await?;
        post.view_count += 1;
        Ok(post)
    }

    pub async fn create(
        &self,
        input: CreatePostRequest,
        author_id: i32,
    ) -> Result<blog_post::Model, AppError> {
        find_account(self.conn, author_id).await?;
        let slug = resolve_slug(input.slug.as_deref(), &input.title)?;
        content::ensure_slug_free::<blog_post::Entity, _>(self.conn, &slug, None).await?;

        let now = Utc::now();
        let model = blog_post::ActiveModel {
            title: Set(input.title.trim().to_string()),
            slug: Set(slug),
            excerpt: Set(input.excerpt.map(|e| e.trim().to_string())),
            content: Set(input.content),
            cover_image_url: Set(input.cover_image_url.map(|u| u.trim().to_string())),
            tags: Set(serde_json::json!(normalize_tags(&input.tags))),
            status: Set(ContentStatus::Draft),
            author_id: Set(Some(author_id)),
            view_count: Set(0),
            published_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let post = model.insert(self.conn).await.map_err(map_write_error)?;
        info!(post_id = post.id, author_id, "Blog post created");
        Ok(post)
    }

    /// Any EDITOR may edit a post that is not archived.
    pub async fn update(
        &self,
        id: i32,
        input: UpdatePostRequest,
    ) -> Result<blog_post::Model, AppError> {
        let post = self.find(id).await?;
        ensure_editable(post.status)?;

        let mut active: blog_post::ActiveModel = post.into();

        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(slug) = input.slug {
            let slug = slug.trim().to_string();
            validate_slug(&slug)?;
            content::ensure_slug_free::<blog_post::Entity, _>(self.conn, &slug, Some(id)).await?;
            active.slug = Set(slug);
        }
        if let Some(excerpt) = input.excerpt {
            active.excerpt = Set(excerpt.map(|e| e.trim().to_string()));
        }
        if let Some(body) = input.content {
            active.content = Set(body);
        }
        if let Some(url) = input.cover_image_url {
            active.cover_image_url = Set(url.map(|u| u.trim().to_string()));
        }
        if let Some(tags) = input.tags {
            active.tags = Set(serde_json::json!(normalize_tags(&tags)));
        }

        if !active.is_changed() {
            return self.find(id).await;
        }
        active.updated_at = Set(Utc::now());

        content::save_edit::<blog_post::Entity, _, _>(self.conn, id, active).await
    }

    /// Only the author or an ADMIN may delete.
    pub async fn delete(&self, id: i32, actor: &AuthUser) -> Result<(), AppError> {
        let post = self.find(id).await?;
        if post.author_id != Some(actor.user_id) && !actor.role.at_least(Role::Admin) {
            return Err(AppError::PermissionDenied);
        }
        blog_post::Entity::delete_by_id(id).exec(self.conn).await?;
        info!(post_id = id, actor_id = actor.user_id, "Blog post deleted");
        Ok(())
    }

    pub async fn publish(&self, id: i32) -> Result<blog_post::Model, AppError> {
        content::transition::<blog_post::Entity, _>(self.conn, id, ContentStatus::Published).await
    }

    pub async fn archive(&self, id: i32) -> Result<blog_post::Model, AppError> {
        content::transition::<blog_post::Entity, _>(self.conn, id, ContentStatus::Archived).await
    }

    pub async fn stats(&self) -> Result<BlogStats, AppError> {
        let statuses = content::status_counts::<blog_post::Entity, _>(self.conn).await?;
        let total_views = content::total_views::<blog_post::Entity, _>(self.conn).await?;
        let top_posts =
            content::top_viewed::<blog_post::Entity, PostSummary, _>(self.conn).await?;

        let tag_rows: Vec<serde_json::Value> = blog_post::Entity::find()
            .select_only()
            .column(blog_post::Column::Tags)
            .filter(blog_post::Column::Status.eq(ContentStatus::Published))
            .into_tuple()
            .all(self.conn)
            .await?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for tags in &tag_rows {
            for tag in tags_from_json(tags) {
                *counts.entry(tag).or_default() += 1;
            }
        }
        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));

        Ok(BlogStats {
            total: statuses.total(),
            drafts: statuses.drafts,
            published: statuses.published,
            archived: statuses.archived,
            total_views,
            top_posts,
            tags,
        })
    }

    async fn find(&self, id: i32) -> Result<blog_post::Model, AppError> {
        content::find::<blog_post::Entity, _>(self.conn, id).await
    }
}
