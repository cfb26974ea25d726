use common::TokenPurpose;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Single-use emailed token (password reset or email verification).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub purpose: TokenPurpose,

    #[sea_orm(unique)]
    pub token_hash: String,

    pub expires_at: DateTimeUtc,
    pub consumed_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
