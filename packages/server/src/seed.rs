use chrono::Utc;
use common::Role;
use sea_orm::sea_query::{Index, OnConflict};
use sea_orm::*;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::entity::{blog_post, media_asset, project, project_image, session, user, user_token};
use crate::utils::hash;

/// Create the configured SUPER_ADMIN if both bootstrap credentials are set
/// and the email is not registered yet.
pub async fn bootstrap_admin(db: &DatabaseConnection, auth: &AuthConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (
        auth.bootstrap_admin_email.as_deref(),
        auth.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let email = email.trim().to_lowercase();
    let password_hash = hash::hash_password_blocking(password.to_string())
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let now = Utc::now();
    let model = user::ActiveModel {
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        name: Set("Administrator".to_string()),
        role: Set(Role::SuperAdmin),
        email_verified_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let result = user::Entity::insert(model)
        .on_conflict(
            OnConflict::column(user::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(0) | Err(DbErr::RecordNotInserted) => {}
        Ok(_) => info!(email = %email, "Seeded bootstrap super admin"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Ensure required database indexes exist.
///
/// Schema sync only creates single-column unique indexes, so composite
/// lookup indexes are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let indexes = [
        (
            "idx_blog_post_status_published",
            Index::create()
                .if_not_exists()
                .name("idx_blog_post_status_published")
                .table(blog_post::Entity)
                .col(blog_post::Column::Status)
                .col(blog_post::Column::PublishedAt)
                .to_owned(),
        ),
        (
            "idx_project_status_featured",
            Index::create()
                .if_not_exists()
                .name("idx_project_status_featured")
                .table(project::Entity)
                .col(project::Column::Status)
                .col(project::Column::Featured)
                .to_owned(),
        ),
        (
            "idx_project_image_project_position",
            Index::create()
                .if_not_exists()
                .name("idx_project_image_project_position")
                .table(project_image::Entity)
                .col(project_image::Column::ProjectId)
                .col(project_image::Column::Position)
                .to_owned(),
        ),
        (
            "idx_session_user",
            Index::create()
                .if_not_exists()
                .name("idx_session_user")
                .table(session::Entity)
                .col(session::Column::UserId)
                .col(session::Column::RevokedAt)
                .to_owned(),
        ),
        (
            "idx_session_family",
            Index::create()
                .if_not_exists()
                .name("idx_session_family")
                .table(session::Entity)
                .col(session::Column::FamilyId)
                .to_owned(),
        ),
        (
            "idx_user_token_user_purpose",
            Index::create()
                .if_not_exists()
                .name("idx_user_token_user_purpose")
                .table(user_token::Entity)
                .col(user_token::Column::UserId)
                .col(user_token::Column::Purpose)
                .to_owned(),
        ),
        (
            "idx_media_asset_owner",
            Index::create()
                .if_not_exists()
                .name("idx_media_asset_owner")
                .table(media_asset::Entity)
                .col(media_asset::Column::OwnerId)
                .to_owned(),
        ),
    ];

    let backend = db.get_database_backend();
    for (name, stmt) in &indexes {
        let sql = backend.build(stmt).sql;
        match db.execute_unprepared(&sql).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}
