use chrono::Utc;
use common::{ContentStatus, Transition};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Alias, Func};
use sea_orm::*;
use tracing::info;

use crate::entity::{blog_post, project};
use crate::error::{AppError, map_actor_fk};

/// A table of lifecycle-managed content: blog posts and projects.
pub trait ContentEntity: EntityTrait {
    /// Used in not-found messages.
    const NOUN: &'static str;
    const ID: Self::Column;
    const SLUG: Self::Column;
    const STATUS: Self::Column;
    const VIEW_COUNT: Self::Column;
    const PUBLISHED_AT: Self::Column;
    const UPDATED_AT: Self::Column;

    fn status_of(model: &Self::Model) -> ContentStatus;

    /// Columns selected for list rows; the body column is left out.
    fn summary_columns() -> Vec<Self::Column>;
}

impl ContentEntity for blog_post::Entity {
    const NOUN: &'static str = "Post";
    const ID: blog_post::Column = blog_post::Column::Id;
    const SLUG: blog_post::Column = blog_post::Column::Slug;
    const STATUS: blog_post::Column = blog_post::Column::Status;
    const VIEW_COUNT: blog_post::Column = blog_post::Column::ViewCount;
    const PUBLISHED_AT: blog_post::Column = blog_post::Column::PublishedAt;
    const UPDATED_AT: blog_post::Column = blog_post::Column::UpdatedAt;

    fn status_of(model: &blog_post::Model) -> ContentStatus {
        model.status
    }

    fn summary_columns() -> Vec<blog_post::Column> {
        vec![
            blog_post::Column::Id,
            blog_post::Column::Title,
            blog_post::Column::Slug,
            blog_post::Column::Excerpt,
            blog_post::Column::CoverImageUrl,
            blog_post::Column::Tags,
            blog_post::Column::Status,
            blog_post::Column::AuthorId,
            blog_post::Column::ViewCount,
            blog_post::Column::PublishedAt,
            blog_post::Column::CreatedAt,
            blog_post::Column::UpdatedAt,
        ]
    }
}

impl ContentEntity for project::Entity {
    const NOUN: &'static str = "Project";
    const ID: project::Column = project::Column::Id;
    const SLUG: project::Column = project::Column::Slug;
    const STATUS: project::Column = project::Column::Status;
    const VIEW_COUNT: project::Column = project::Column::ViewCount;
    const PUBLISHED_AT: project::Column = project::Column::PublishedAt;
    const UPDATED_AT: project::Column = project::Column::UpdatedAt;

    fn status_of(model: &project::Model) -> ContentStatus {
        model.status
    }

    fn summary_columns() -> Vec<project::Column> {
        vec![
            project::Column::Id,
            project::Column::Title,
            project::Column::Slug,
            project::Column::Summary,
            project::Column::Client,
            project::Column::Category,
            project::Column::Featured,
            project::Column::Status,
            project::Column::AuthorId,
            project::Column::ViewCount,
            project::Column::PublishedAt,
            project::Column::CreatedAt,
            project::Column::UpdatedAt,
        ]
    }
}

/// Per-status row counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub drafts: u64,
    pub published: u64,
    pub archived: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.drafts + self.published + self.archived
    }
}

pub fn not_found<E: ContentEntity>() -> AppError {
    AppError::NotFound(format!("{} not found", E::NOUN))
}

pub async fn find<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<E::Model, AppError> {
    E::find()
        .filter(E::ID.eq(id))
        .one(conn)
        .await?
        .ok_or_else(not_found::<E>)
}

pub async fn find_by_slug<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
    slug: &str,
) -> Result<E::Model, AppError> {
    E::find()
        .filter(E::SLUG.eq(slug))
        .one(conn)
        .await?
        .ok_or_else(not_found::<E>)
}

pub async fn ensure_slug_free<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut select = E::find().filter(E::SLUG.eq(slug));
    if let Some(id) = except {
        select = select.filter(E::ID.ne(id));
    }
    if select.one(conn).await?.is_some() {
        return Err(AppError::Conflict(format!("Slug '{slug}' is already in use")));
    }
    Ok(())
}

/// Map a failed content write. A unique violation can only be the slug; a
/// foreign key violation means the author account no longer exists.
pub fn map_write_error(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Slug is already in use".into())
        }
        _ => map_actor_fk(e),
    }
}

/// Restrict a select to the list-row columns.
pub fn summary_select<E: ContentEntity>(select: Select<E>) -> Select<E> {
    select.select_only().columns(E::summary_columns())
}

/// Write an edit unless the row has been archived in the meantime.
///
/// The status check is part of the `UPDATE` itself, so an archive that lands
/// between the caller's read and this write still wins.
pub async fn save_edit<E, A, C>(conn: &C, id: i32, active: A) -> Result<E::Model, AppError>
where
    E: ContentEntity,
    A: ActiveModelTrait<Entity = E>,
    C: ConnectionTrait,
{
    let result = E::update_many()
        .set(active)
        .filter(E::ID.eq(id))
        .filter(E::STATUS.ne(ContentStatus::Archived))
        .exec(conn)
        .await
        .map_err(map_write_error)?;

    let current = find::<E, _>(conn, id).await?;
    if result.rows_affected == 0 {
        ensure_editable(E::status_of(&current))?;
    }
    Ok(current)
}

/// Move a row to `target` with an update conditioned on its current status,
/// so concurrent transitions cannot both apply. Returns the row as stored
/// afterwards.
pub async fn transition<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
    id: i32,
    target: ContentStatus,
) -> Result<E::Model, AppError> {
    let current = find::<E, _>(conn, id).await?;
    if plan_transition(E::status_of(&current), target)? == Transition::Unchanged {
        return Ok(current);
    }

    let now = Utc::now();
    let mut update = E::update_many()
        .col_expr(E::STATUS, Expr::value(target))
        .col_expr(E::UPDATED_AT, Expr::value(now))
        .filter(E::ID.eq(id))
        .filter(E::STATUS.is_in(ContentStatus::sources_of(target).iter().copied()));
    if target == ContentStatus::Published {
        update = update.col_expr(
            E::PUBLISHED_AT,
            Func::coalesce([Expr::col(E::PUBLISHED_AT).into(), Expr::value(now)]).into(),
        );
    }
    let result = update.exec(conn).await?;

    let stored = find::<E, _>(conn, id).await?;
    settle_transition(result.rows_affected, E::status_of(&stored), target)?;
    info!(kind = E::NOUN, id, status = %target, "Content status changed");
    Ok(stored)
}

/// Count one view of a published row.
pub async fn record_view<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<(), AppError> {
    E::update_many()
        .col_expr(E::VIEW_COUNT, Expr::col(E::VIEW_COUNT).add(1))
        .filter(E::ID.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn status_counts<E: ContentEntity, C: ConnectionTrait>(
    conn: &C,
) -> Result<StatusCounts, AppError> {
    let rows: Vec<(ContentStatus, i64)> = E::find()
        .select_only()
        .column(E::STATUS)
        .column_as(Expr::expr(Func::count(Expr::col(E::ID))), "count")
        .group_by(E::STATUS)
        .into_tuple()
        .all(conn)
        .await?;

    let mut counts = StatusCounts::default();
    for (status, n) in rows {
        let n = std::cmp::Ord::max(n, 0) as u64;
        match status {
            ContentStatus::Draft => counts.drafts = n,
            ContentStatus::Published => counts.published = n,
            ContentStatus::Archived => counts.archived = n,
        }
    }
    Ok(counts)
}

pub async fn total_views<E: ContentEntity, C: ConnectionTrait>(conn: &C) -> Result<i64, AppError> {
    Ok(E::find()
        .select_only()
        .column_as(
            Expr::expr(Func::sum(Expr::col(E::VIEW_COUNT))).cast_as(Alias::new("bigint")),
            "total_views",
        )
        .into_tuple::<Option<i64>>()
        .one(conn)
        .await?
        .flatten()
        .unwrap_or(0))
}

/// The five most viewed published rows, lowest id first on ties.
pub async fn top_viewed<E, M, C>(conn: &C) -> Result<Vec<M>, AppError>
where
    E: ContentEntity,
    M: FromQueryResult,
    C: ConnectionTrait,
{
    Ok(summary_select(E::find().filter(E::STATUS.eq(ContentStatus::Published)))
        .order_by(E::VIEW_COUNT, Order::Desc)
        .order_by(E::ID, Order::Asc)
        .limit(Some(5u64))
        .into_model::<M>()
        .all(conn)
        .await?)
}

/// Validate a requested status change against the current status.
pub fn plan_transition(
    current: ContentStatus,
    target: ContentStatus,
) -> Result<Transition, AppError> {
    Ok(current.transition(target)?)
}

/// Decide the outcome of a conditional status update that touched `rows`
/// rows, given the status observed afterwards.
///
/// Zero rows with the entity already at `target` means a concurrent request
/// made the same change first, which is treated as success.
pub fn settle_transition(
    rows: u64,
    observed: ContentStatus,
    target: ContentStatus,
) -> Result<(), AppError> {
    if rows == 1 || observed == target {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: observed,
            to: target,
        })
    }
}

/// Archived content is read-only.
pub fn ensure_editable(status: ContentStatus) -> Result<(), AppError> {
    if status.is_terminal() {
        Err(AppError::InvalidTransition {
            from: status,
            to: status,
        })
    } else {
        Ok(())
    }
}
