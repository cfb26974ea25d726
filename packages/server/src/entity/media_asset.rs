use common::MediaVisibility;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_asset")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Object key in the configured store.
    #[sea_orm(unique)]
    pub storage_key: String,

    /// Original upload filename.
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    /// SHA-256 hex digest of the stored bytes.
    pub checksum: String,

    pub visibility: MediaVisibility,
    pub alt_text: Option<String>,

    /// NULL once the uploading user has been deleted.
    pub owner_id: Option<i32>,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
