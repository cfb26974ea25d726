#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Publication state of a blog post or project.
///
/// The lifecycle is linear: `Draft -> Published -> Archived`, and a draft may
/// be archived directly. `Archived` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "DRAFT"))]
    Draft,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "PUBLISHED"))]
    Published,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "ARCHIVED"))]
    Archived,
}

/// Outcome of a permitted status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The entity moves to the target status.
    Changed,
    /// The entity is already in the target status.
    Unchanged,
}

/// A transition the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move content from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ContentStatus,
    pub to: ContentStatus,
}

impl ContentStatus {
    pub const ALL: &'static [ContentStatus] = &[Self::Draft, Self::Published, Self::Archived];

    /// Check whether `self -> target` is allowed.
    pub fn transition(self, target: ContentStatus) -> Result<Transition, InvalidTransition> {
        use ContentStatus::*;
        match (self, target) {
            (a, b) if a == b => Ok(Transition::Unchanged),
            (Draft, Published) | (Draft, Archived) | (Published, Archived) => {
                Ok(Transition::Changed)
            }
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }

    /// Statuses from which `target` can be reached in one step.
    pub fn sources_of(target: ContentStatus) -> &'static [ContentStatus] {
        match target {
            Self::Draft => &[],
            Self::Published => &[Self::Draft],
            Self::Archived => &[Self::Draft, Self::Published],
        }
    }

    /// Returns true if content in this status can no longer be edited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ContentStatus {
    fn default() -> Self {
        Self::Draft
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{invalid}'. Valid values: DRAFT, PUBLISHED, ARCHIVED")]
pub struct ParseContentStatusError {
    invalid: String,
}

impl FromStr for ContentStatus {
    type Err = ParseContentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "PUBLISHED" => Ok(Self::Published),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(ParseContentStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
