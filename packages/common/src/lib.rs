pub mod config;
pub mod content_status;
pub mod role;
pub mod storage;
pub mod token_purpose;
pub mod visibility;

pub use content_status::{ContentStatus, InvalidTransition, Transition};
pub use role::Role;
pub use token_purpose::TokenPurpose;
pub use visibility::MediaVisibility;
