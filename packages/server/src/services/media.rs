use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use common::storage::{ContentHash, ObjectStore};
use common::{MediaVisibility, Role};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::entity::{media_asset, project_image};
use crate::error::{AppError, map_actor_fk};
use crate::extractors::auth::AuthUser;
use crate::models::media::*;
use crate::models::shared::{Pagination, escape_like, page_params};
use crate::services::user::find_account;
use crate::utils::{filename, mime};

/// One file received from a multipart upload.
pub struct UploadInput {
    pub filename: String,
    /// Content type declared by the client, if any.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
    pub visibility: MediaVisibility,
    pub alt_text: Option<String>,
}

pub struct MediaService<'a, C: ConnectionTrait> {
    conn: &'a C,
    store: Option<&'a Arc<dyn ObjectStore>>,
    config: &'a MediaConfig,
}

impl<'a, C: ConnectionTrait> MediaService<'a, C> {
    pub fn new(
        conn: &'a C,
        store: Option<&'a Arc<dyn ObjectStore>>,
        config: &'a MediaConfig,
    ) -> Self {
        Self {
            conn,
            store,
            config,
        }
    }

    fn store(&self) -> Result<&'a Arc<dyn ObjectStore>, AppError> {
        self.store
            .ok_or_else(|| AppError::ServiceUnavailable("Object storage is not configured".into()))
    }

    fn respond(&self, asset: media_asset::Model) -> MediaResponse {
        let url = self.store.map(|s| s.public_url(&asset.storage_key));
        MediaResponse::new(asset, url)
    }

    /// Validate and store an upload. Nothing reaches the store unless every
    /// check passes.
    pub async fn upload(
        &self,
        input: UploadInput,
        owner_id: i32,
    ) -> Result<MediaResponse, AppError> {
        let store = self.store()?;
        find_account(self.conn, owner_id).await?;

        let name = filename::validate_flat_filename(&input.filename)
            .map_err(|e| AppError::Validation(e.message().into()))?
            .to_string();

        if input.bytes.is_empty() {
            return Err(AppError::Validation("File is empty".into()));
        }
        if input.bytes.len() > self.config.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the maximum size of {} bytes",
                self.config.max_upload_bytes
            )));
        }

        let content_type = mime::resolve_content_type(input.declared_type.as_deref(), &name);
        if !self
            .config
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(AppError::Validation(format!(
                "Content type '{content_type}' is not allowed"
            )));
        }
        if !mime::content_matches(&content_type, &input.bytes) {
            return Err(AppError::Validation(format!(
                "File content does not match declared type '{content_type}'"
            )));
        }

        validate_alt_text(input.alt_text.as_deref())?;

        let id = Uuid::now_v7();
        let now = Utc::now();
        let key = format!(
            "media/{:04}/{:02}/{}.{}",
            now.year(),
            now.month(),
            id,
            mime::extension_for(&content_type, &name)
        );
        let checksum = ContentHash::compute(&input.bytes).to_hex();
        let size = input.bytes.len() as i64;

        store.put(&key, &input.bytes, &content_type).await?;

        let model = media_asset::ActiveModel {
            id: Set(id),
            storage_key: Set(key.clone()),
            filename: Set(name),
            content_type: Set(content_type),
            size: Set(size),
            checksum: Set(checksum),
            visibility: Set(input.visibility),
            alt_text: Set(input.alt_text.map(|a| a.trim().to_string())),
            owner_id: Set(Some(owner_id)),
            created_at: Set(now),
        };

        let asset = match model.insert(self.conn).await {
            Ok(asset) => asset,
            Err(e) => {
                if let Err(cleanup) = store.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Failed to remove orphaned object");
                }
                return Err(map_actor_fk(e));
            }
        };

        info!(media_id = %asset.id, owner_id, size, "Media uploaded");
        Ok(self.respond(asset))
    }

    pub async fn list(&self, query: &MediaListQuery) -> Result<MediaListResponse, AppError> {
        let (page, per_page) = page_params(query.page, query.per_page);

        let mut select = media_asset::Entity::find();

        if let Some(ref search) = query.search {
            let term = escape_like(search.trim());
            if !term.is_empty() {
                select = select.filter(
                    Expr::expr(Func::lower(Expr::col(media_asset::Column::Filename)))
                        .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
                );
            }
        }

        if let Some(ref content_type) = query.content_type {
            let content_type = content_type.trim().to_ascii_lowercase();
            if content_type.contains('/') {
                select = select.filter(media_asset::Column::ContentType.eq(content_type));
            } else if !content_type.is_empty() {
                select = select.filter(
                    media_asset::Column::ContentType
                        .like(LikeExpr::new(format!("{}/%", escape_like(&content_type))).escape('\\')),
                );
            }
        }

        if let Some(visibility) = query.visibility {
            select = select.filter(media_asset::Column::Visibility.eq(visibility));
        }
        if let Some(owner_id) = query.owner_id {
            select = select.filter(media_asset::Column::OwnerId.eq(owner_id));
        }

        let total = select.clone().paginate(self.conn, per_page).num_items().await?;

        let data = select
            .order_by_desc(media_asset::Column::CreatedAt)
            .order_by_desc(media_asset::Column::Id)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|asset| self.respond(asset))
            .collect();

        Ok(MediaListResponse {
            data,
            pagination: Pagination::new(page, per_page, total),
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<MediaResponse, AppError> {
        let asset = self.find(id).await?;
        Ok(self.respond(asset))
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateMediaRequest,
    ) -> Result<MediaResponse, AppError> {
        let asset = self.find(id).await?;
        let mut active: media_asset::ActiveModel = asset.clone().into();

        if let Some(alt_text) = input.alt_text {
            active.alt_text = Set(alt_text.map(|a| a.trim().to_string()));
        }
        if let Some(visibility) = input.visibility {
            active.visibility = Set(visibility);
        }

        let asset = if active.is_changed() {
            active.update(self.conn).await?
        } else {
            asset
        };
        Ok(self.respond(asset))
    }

    /// Owner or ADMIN only. Assets used in a project gallery cannot be deleted.
    pub async fn delete(&self, id: Uuid, actor: &AuthUser) -> Result<(), AppError> {
        let asset = self.find(id).await?;
        if asset.owner_id != Some(actor.user_id) && !actor.role.at_least(Role::Admin) {
            return Err(AppError::PermissionDenied);
        }

        let references = project_image::Entity::find()
            .filter(project_image::Column::MediaId.eq(id))
            .count(self.conn)
            .await?;
        if references > 0 {
            return Err(AppError::Conflict(format!(
                "Media is used by {references} project image(s)"
            )));
        }

        media_asset::Entity::delete_by_id(id).exec(self.conn).await?;

        if let Some(store) = self.store {
            match store.delete(&asset.storage_key).await {
                Ok(true) => {}
                Ok(false) => warn!(key = %asset.storage_key, "Stored object was already gone"),
                Err(e) => warn!(key = %asset.storage_key, error = %e, "Failed to delete stored object"),
            }
        }

        info!(media_id = %id, actor_id = actor.user_id, "Media deleted");
        Ok(())
    }

    /// Time-limited read URL. Private assets need EDITOR or ownership.
    pub async fn signed_url(
        &self,
        id: Uuid,
        actor: &AuthUser,
        ttl: Duration,
    ) -> Result<SignedUrlResponse, AppError> {
        let asset = self.find(id).await?;
        if asset.visibility == MediaVisibility::Private
            && asset.owner_id != Some(actor.user_id)
            && !actor.role.at_least(Role::Editor)
        {
            return Err(AppError::PermissionDenied);
        }

        let signed = self.store()?.signed_url(&asset.storage_key, ttl).await?;
        Ok(SignedUrlResponse {
            url: signed.url,
            expires_at: signed.expires_at,
        })
    }

    /// Resolve a storage key to its asset, used when serving files.
    pub async fn find_by_key(&self, key: &str) -> Result<media_asset::Model, AppError> {
        media_asset::Entity::find()
            .filter(media_asset::Column::StorageKey.eq(key))
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".into()))
    }

    pub async fn stats(&self) -> Result<MediaStats, AppError> {
        let rows: Vec<(String, i64, MediaVisibility)> = media_asset::Entity::find()
            .select_only()
            .columns([
                media_asset::Column::ContentType,
                media_asset::Column::Size,
                media_asset::Column::Visibility,
            ])
            .into_tuple()
            .all(self.conn)
            .await?;

        let mut by_kind: BTreeMap<String, (u64, i64)> = BTreeMap::new();
        let (mut public, mut private, mut total_bytes) = (0u64, 0u64, 0i64);
        for (content_type, size, visibility) in &rows {
            let kind = content_type
                .split('/')
                .next()
                .unwrap_or(content_type)
                .to_string();
            let entry = by_kind.entry(kind).or_default();
            entry.0 += 1;
            entry.1 += size;
            total_bytes += size;
            match visibility {
                MediaVisibility::Public => public += 1,
                MediaVisibility::Private => private += 1,
            }
        }

        let mut by_type: Vec<TypeUsage> = by_kind
            .into_iter()
            .map(|(kind, (count, bytes))| TypeUsage { kind, count, bytes })
            .collect();
        by_type.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.kind.cmp(&b.kind)));

        Ok(MediaStats {
            count: rows.len() as u64,
            total_bytes,
            public,
            private,
            by_type,
        })
    }

    async fn find(&self, id: Uuid) -> Result<media_asset::Model, AppError> {
        media_asset::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Media asset not found".into()))
    }
}
