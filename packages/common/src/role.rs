#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege level of a user account.
///
/// Variants are declared in ascending order of privilege so the derived `Ord`
/// is the authorization order: `Viewer < Editor < Admin < SuperAdmin`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Can read published content and manage their own profile.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "VIEWER"))]
    Viewer,
    /// Can write blog posts, projects and media.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "EDITOR"))]
    Editor,
    /// Can manage users below their own level.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "ADMIN"))]
    Admin,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "SUPER_ADMIN"))]
    SuperAdmin,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: &'static [Role] = &[Self::Viewer, Self::Editor, Self::Admin, Self::SuperAdmin];

    /// Returns true if this role meets or exceeds `required`.
    pub fn at_least(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "VIEWER",
            Self::Editor => "EDITOR",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

/// Error when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role '{invalid}'. Valid values: VIEWER, EDITOR, ADMIN, SUPER_ADMIN")]
pub struct ParseRoleError {
    invalid: String,
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEWER" => Ok(Self::Viewer),
            "EDITOR" => Ok(Self::Editor),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            _ => Err(ParseRoleError {
                invalid: s.to_string(),
            }),
        }
    }
}
