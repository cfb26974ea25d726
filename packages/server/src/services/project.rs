use std::collections::HashMap;

use chrono::Utc;
use common::storage::ObjectStore;
use common::{ContentStatus, Role};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::info;

use crate::entity::{media_asset, project, project_image};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::project::*;
use crate::models::shared::{Pagination, escape_like, page_params, sort_order};
use crate::services::content::{self, ensure_editable, map_write_error, summary_select};
use crate::services::user::find_account;
use crate::utils::slug::{resolve_slug, validate_slug};

pub struct ProjectService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProjectService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Paginated listing. Callers below EDITOR only see published projects.
    pub async fn list(
        &self,
        query: &ProjectListQuery,
        staff: bool,
    ) -> Result<ProjectListResponse, AppError> {
        let (page, per_page) = page_params(query.page, query.per_page);

        let mut select = project::Entity::find();

        if !staff {
            select = select.filter(project::Column::Status.eq(ContentStatus::Published));
        } else if let Some(status) = query.status {
            select = select.filter(project::Column::Status.eq(status));
        }

        if let Some(featured) = query.featured {
            select = select.filter(project::Column::Featured.eq(featured));
        }

        if let Some(ref category) = query.category {
            let category = category.trim().to_lowercase();
            if !category.is_empty() {
                select = select.filter(project::Column::Category.eq(category));
            }
        }

        if let Some(ref search) = query.search {
            let term = escape_like(search.trim());
            if !term.is_empty() {
                select = select.filter(
                    Expr::expr(Func::lower(Expr::col(project::Column::Title)))
                        .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
                );
            }
        }

        let default_sort = if staff { "created_at" } else { "published_at" };
        let sort_column = match query.sort_by.as_deref().unwrap_or(default_sort) {
            "published_at" => project::Column::PublishedAt,
            "created_at" => project::Column::CreatedAt,
            "view_count" => project::Column::ViewCount,
            "title" => project::Column::Title,
            _ => {
                return Err(AppError::Validation(
                    "sort_by must be one of: published_at, created_at, view_count, title".into(),
                ));
            }
        };

        let total = select.clone().paginate(self.conn, per_page).num_items().await?;

        let data = summary_select(select)
            .order_by(sort_column, sort_order(query.sort_order.as_deref()))
            .order_by(project::Column::Id, Order::Desc)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .into_model::<ProjectSummary>()
            .all(self.conn)
            .await?;

        Ok(ProjectListResponse {
            data,
            pagination: Pagination::new(page, per_page, total),
        })
    }

    pub async fn get(&self, id: i32, staff: bool) -> Result<ProjectResponse, AppError> {
        let project = self.find(id).await?;
        if !staff && project.status != ContentStatus::Published {
            return Err(AppError::NotFound("Project not found".into()));
        }
        self.with_images(project).await
    }

    /// Public read by slug; counts a view for published projects.
    pub async fn get_by_slug(&self, slug: &str, staff: bool) -> Result<ProjectResponse, AppError> {
        let mut project = content::find_by_slug::<project::Entity, _>(self.conn, slug).await?;

        if project.status == ContentStatus::Published {
            content::record_view::<project::Entity, _>(self.conn, project.id).await?;
            project.view_count += 1;
        } else if !staff {
            return Err(AppError::NotFound("Project not found".into()));
        }

        self.with_images(project).await
    }

    pub async fn create(
        &self,
        input: CreateProjectRequest,
        author_id: i32,
    ) -> Result<ProjectResponse, AppError> {
        find_account(self.conn, author_id).await?;
        let slug = resolve_slug(input.slug.as_deref(), &input.title)?;
        content::ensure_slug_free::<project::Entity, _>(self.conn, &slug, None).await?;

        let now = Utc::now();
        let model = project::ActiveModel {
            title: Set(input.title.trim().to_string()),
            slug: Set(slug),
            summary: Set(input.summary.map(|s| s.trim().to_string())),
            description: Set(input.description),
            client: Set(input.client.map(|c| c.trim().to_string())),
            category: Set(input.category.map(|c| c.trim().to_lowercase())),
            featured: Set(input.featured),
            status: Set(ContentStatus::Draft),
            author_id: Set(Some(author_id)),
            view_count: Set(0),
            published_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let project = model.insert(self.conn).await.map_err(map_write_error)?;
        info!(project_id = project.id, author_id, "Project created");
        Ok(ProjectResponse::new(project, Vec::new()))
    }

    pub async fn update(
        &self,
        id: i32,
        input: UpdateProjectRequest,
    ) -> Result<ProjectResponse, AppError> {
        let project = self.find(id).await?;
        ensure_editable(project.status)?;

        let mut active: project::ActiveModel = project.into();

        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(slug) = input.slug {
            let slug = slug.trim().to_string();
            validate_slug(&slug)?;
            content::ensure_slug_free::<project::Entity, _>(self.conn, &slug, Some(id)).await?;
            active.slug = Set(slug);
        }
        if let Some(summary) = input.summary {
            active.summary = Set(summary.map(|s| s.trim().to_string()));
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(client) = input.client {
            active.client = Set(client.map(|c| c.trim().to_string()));
        }
        if let Some(category) = input.category {
            active.category = Set(category.map(|c| c.trim().to_lowercase()));
        }
        if let Some(featured) = input.featured {
            active.featured = Set(featured);
        }

        let project = if active.is_changed() {
            active.updated_at = Set(Utc::now());
            content::save_edit::<project::Entity, _, _>(self.conn, id, active).await?
        } else {
            self.find(id).await?
        };
        self.with_images(project).await
    }

    /// Only the author or an ADMIN may delete. Gallery rows go with it.
    pub async fn delete(&self, id: i32, actor: &AuthUser) -> Result<(), AppError> {
        let project = self.find(id).await?;
        if project.author_id != Some(actor.user_id) && !actor.role.at_least(Role::Admin) {
            return Err(AppError::PermissionDenied);
        }
        project_image::Entity::delete_many()
            .filter(project_image::Column::ProjectId.eq(id))
            .exec(self.conn)
            .await?;
        project::Entity::delete_by_id(id).exec(self.conn).await?;
        info!(project_id = id, actor_id = actor.user_id, "Project deleted");
        Ok(())
    }

    pub async fn publish(&self, id: i32) -> Result<ProjectResponse, AppError> {
        let project =
            content::transition::<project::Entity, _>(self.conn, id, ContentStatus::Published)
                .await?;
        self.with_images(project).await
    }

    pub async fn archive(&self, id: i32) -> Result<ProjectResponse, AppError> {
        let project =
            content::transition::<project::Entity, _>(self.conn, id, ContentStatus::Archived)
                .await?;
        self.with_images(project).await
    }

    /// Attach an uploaded asset or external URL to the gallery.
    pub async fn add_image(
        &self,
        project_id: i32,
        input: AddImageRequest,
        store: Option<&dyn ObjectStore>,
    ) -> Result<ProjectImageResponse, AppError> {
        let project = self.find(project_id).await?;
        ensure_editable(project.status)?;

        let (media_id, url) = match (input.media_id, input.url) {
            (Some(media_id), _) => {
                let asset = media_asset::Entity::find_by_id(media_id)
                    .one(self.conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Media asset not found".into()))?;
                let store = store.ok_or_else(|| {
                    AppError::ServiceUnavailable("Object storage is not configured".into())
                })?;
                (Some(asset.id), store.public_url(&asset.storage_key))
            }
            (None, Some(url)) => (None, url.trim().to_string()),
            (None, None) => {
                return Err(AppError::Validation("Either media_id or url is required".into()));
            }
        };

        let position = match input.position {
            Some(p) => p,
            None => {
                let max: Option<i32> = project_image::Entity::find()
                    .select_only()
                    .column_as(Expr::col(project_image::Column::Position).max(), "max_position")
                    .filter(project_image::Column::ProjectId.eq(project_id))
                    .into_tuple::<Option<i32>>()
                    .one(self.conn)
                    .await?
                    .flatten();
                max.map_or(0, |m| m + 1)
            }
        };

        let image = project_image::ActiveModel {
            project_id: Set(project_id),
            media_id: Set(media_id),
            url: Set(url),
            alt_text: Set(input.alt_text.map(|a| a.trim().to_string())),
            position: Set(position),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        Ok(image.into())
    }

    /// 404 when the image does not belong to this project.
    pub async fn remove_image(&self, project_id: i32, image_id: i32) -> Result<(), AppError> {
        let project = self.find(project_id).await?;
        ensure_editable(project.status)?;

        let result = project_image::Entity::delete_many()
            .filter(project_image::Column::Id.eq(image_id))
            .filter(project_image::Column::ProjectId.eq(project_id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Image not found".into()));
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<ProjectStats, AppError> {
        let statuses = content::status_counts::<project::Entity, _>(self.conn).await?;

        let featured = project::Entity::find()
            .filter(project::Column::Featured.eq(true))
            .filter(project::Column::Status.eq(ContentStatus::Published))
            .count(self.conn)
            .await?;

        let total_views = content::total_views::<project::Entity, _>(self.conn).await?;
        let top_projects =
            content::top_viewed::<project::Entity, ProjectSummary, _>(self.conn).await?;

        let rows: Vec<Option<String>> = project::Entity::find()
            .select_only()
            .column(project::Column::Category)
            .filter(project::Column::Status.eq(ContentStatus::Published))
            .into_tuple()
            .all(self.conn)
            .await?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for category in rows.into_iter().flatten() {
            *counts.entry(category).or_default() += 1;
        }
        let mut categories: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        categories.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.category.cmp(&b.category))
        });

        Ok(ProjectStats {
            total: statuses.total(),
            drafts: statuses.drafts,
            published: statuses.published,
            archived: statuses.archived,
            featured,
            total_views,
            top_projects,
            categories,
        })
    }

    async fn with_images(&self, project: project::Model) -> Result<ProjectResponse, AppError> {
        let images = project_image::Entity::find()
            .filter(project_image::Column::ProjectId.eq(project.id))
            .order_by_asc(project_image::Column::Position)
            .order_by_asc(project_image::Column::Id)
            .all(self.conn)
            .await?;
        Ok(ProjectResponse::new(project, images))
    }

    async fn find(&self, id: i32) -> Result<project::Model, AppError> {
        content::find::<project::Entity, _>(self.conn, id).await
    }
}
