use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One refresh token. Rotating a token revokes its row and inserts a
/// successor that shares the same `family_id`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session")]
pub struct Model {
    /// UUIDv7; also carried as the `sid` claim of access tokens.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    /// Identifies every rotation descended from one login.
    pub family_id: Uuid,

    /// SHA-256 hex digest of the opaque refresh token.
    #[sea_orm(unique)]
    pub token_hash: String,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    pub expires_at: DateTimeUtc,
    pub revoked_at: Option<DateTimeUtc>,
    /// Set when this token was exchanged for a successor.
    pub replaced_by: Option<Uuid>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
