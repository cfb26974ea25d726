use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::Role;
use common::storage::ObjectStore;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::{blog_post, media_asset, project, project_image, session, user, user_token};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::media::MediaResponse;
use crate::models::project::ProjectResponse;
use crate::models::shared::{Pagination, escape_like, page_params};
use crate::models::user::*;

/// Load the account behind a verified access token. A deleted account's
/// token stays signed until it expires, so a missing row is `TokenInvalid`.
pub async fn find_account<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(AppError::TokenInvalid)
}

pub struct UserService<'a, C: ConnectionTrait + TransactionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> UserService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn me(&self, user_id: i32) -> Result<user::Model, AppError> {
        find_account(self.conn, user_id).await
    }

    pub async fn get(&self, id: i32) -> Result<user::Model, AppError> {
        self.find(id).await
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        input: UpdateProfileRequest,
    ) -> Result<user::Model, AppError> {
        let user = self.me(user_id).await?;
        let mut active: user::ActiveModel = user.clone().into();

        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(avatar_url) = input.avatar_url {
            active.avatar_url = Set(avatar_url.map(|u| u.trim().to_string()));
        }
        if let Some(bio) = input.bio {
            active.bio = Set(bio);
        }

        if !active.is_changed() {
            return Ok(user);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.conn).await?)
    }

    /// Everything stored about a user, minus credentials.
    pub async fn export(
        &self,
        user_id: i32,
        store: Option<&Arc<dyn ObjectStore>>,
    ) -> Result<UserExport, AppError> {
        let user = self.me(user_id).await?;

        let sessions = session::Entity::find()
            .filter(session::Column::UserId.eq(user_id))
            .order_by_desc(session::Column::CreatedAt)
            .all(self.conn)
            .await?;

        let posts = blog_post::Entity::find()
            .filter(blog_post::Column::AuthorId.eq(user_id))
            .order_by_desc(blog_post::Column::CreatedAt)
            .all(self.conn)
            .await?;

        let projects = project::Entity::find()
            .filter(project::Column::AuthorId.eq(user_id))
            .order_by_desc(project::Column::CreatedAt)
            .all(self.conn)
            .await?;
        let project_ids: Vec<i32> = projects.iter().map(|p| p.id).collect();
        let mut images: HashMap<i32, Vec<project_image::Model>> = HashMap::new();
        for image in project_image::Entity::find()
            .filter(project_image::Column::ProjectId.is_in(project_ids))
            .order_by_asc(project_image::Column::Position)
            .order_by_asc(project_image::Column::Id)
            .all(self.conn)
            .await?
        {
            images.entry(image.project_id).or_default().push(image);
        }
        let projects = projects
            .into_iter()
            .map(|p| {
                let gallery = images.remove(&p.id).unwrap_or_default();
                ProjectResponse::new(p, gallery)
            })
            .collect();

        let media = media_asset::Entity::find()
            .filter(media_asset::Column::OwnerId.eq(user_id))
            .order_by_desc(media_asset::Column::CreatedAt)
            .all(self.conn)
            .await?
            .into_iter()
            .map(|m| {
                let url = store.map(|s| s.public_url(&m.storage_key));
                MediaResponse::new(m, url)
            })
            .collect();

        Ok(UserExport {
            user: user.into(),
            sessions: sessions.into_iter().map(Into::into).collect(),
            posts: posts.into_iter().map(Into::into).collect(),
            projects,
            media,
            exported_at: Utc::now(),
        })
    }

    pub async fn list(&self, query: &UserListQuery) -> Result<UserListResponse, AppError> {
        let (page, per_page) = page_params(query.page, query.per_page);

        let mut select = user::Entity::find();

        if let Some(ref search) = query.search {
            let term = escape_like(search.trim());
            if !term.is_empty() {
                let pattern = format!("%{}%", term.to_lowercase());
                select = select.filter(
                    Condition::any()
                        .add(
                            Expr::col(user::Column::Email)
                                .like(LikeExpr::new(pattern.clone()).escape('\\')),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col(user::Column::Name)))
                                .like(LikeExpr::new(pattern).escape('\\')),
                        ),
                );
            }
        }
        if let Some(role) = query.role {
            select = select.filter(user::Column::Role.eq(role));
        }

        let total = select.clone().paginate(self.conn, per_page).num_items().await?;

        let data = select
            .order_by_asc(user::Column::Id)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .all(self.conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(UserListResponse {
            data,
            pagination: Pagination::new(page, per_page, total),
        })
    }

    /// Set another user's role. The new role is carried by tokens issued on
    /// the target's next refresh or login.
    pub async fn change_role(
        &self,
        actor: &AuthUser,
        target_id: i32,
        role: Role,
    ) -> Result<user::Model, AppError> {
        if actor.user_id == target_id {
            warn!(user_id = actor.user_id, "Attempt to change own role");
            return Err(AppError::PermissionDenied);
        }
        let target = self.find(target_id).await?;
        ensure_can_manage(actor.role, target.role)?;
        ensure_can_grant(actor.role, role)?;

        if target.role == role {
            return Ok(target);
        }

        let previous = target.role;
        let mut active: user::ActiveModel = target.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        let updated = active.update(self.conn).await?;

        info!(
            actor_id = actor.user_id,
            target_id,
            from = %previous,
            to = %role,
            "User role changed"
        );
        Ok(updated)
    }

    /// Hard-delete an account. Sessions and one-time tokens go with it;
    /// authored content and media are kept without an owner.
    pub async fn delete(&self, actor: &AuthUser, target_id: i32) -> Result<(), AppError> {
        if actor.user_id == target_id {
            warn!(user_id = actor.user_id, "Attempt to delete own account");
            return Err(AppError::PermissionDenied);
        }
        let target = self.find(target_id).await?;
        ensure_can_manage(actor.role, target.role)?;

        let txn = self.conn.begin().await?;

        session::Entity::delete_many()
            .filter(session::Column::UserId.eq(target_id))
            .exec(&txn)
            .await?;
        user_token::Entity::delete_many()
            .filter(user_token::Column::UserId.eq(target_id))
            .exec(&txn)
            .await?;
        blog_post::Entity::update_many()
            .col_expr(blog_post::Column::AuthorId, Expr::value(Option::<i32>::None))
            .filter(blog_post::Column::AuthorId.eq(target_id))
            .exec(&txn)
            .await?;
        project::Entity::update_many()
            .col_expr(project::Column::AuthorId, Expr::value(Option::<i32>::None))
            .filter(project::Column::AuthorId.eq(target_id))
            .exec(&txn)
            .await?;
        media_asset::Entity::update_many()
            .col_expr(media_asset::Column::OwnerId, Expr::value(Option::<i32>::None))
            .filter(media_asset::Column::OwnerId.eq(target_id))
            .exec(&txn)
            .await?;
        user::Entity::delete_by_id(target_id).exec(&txn).await?;

        txn.commit().await?;

        warn!(actor_id = actor.user_id, target_id, email = %target.email, "User deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<user::Model, AppError> {
        user::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }
}

/// Actors only manage users strictly below them; SUPER_ADMIN manages everyone.
pub fn ensure_can_manage(actor: Role, target: Role) -> Result<(), AppError> {
    if actor == Role::SuperAdmin || actor > target {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Grantable roles sit strictly below the actor's; SUPER_ADMIN grants any.
pub fn ensure_can_grant(actor: Role, role: Role) -> Result<(), AppError> {
    if actor == Role::SuperAdmin || actor > role {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}
