pub mod auth;
pub mod blog;
pub mod content;
pub mod media;
pub mod project;
pub mod user;
