pub mod auth;
pub mod blog;
pub mod media;
pub mod project;
pub mod shared;
pub mod user;
