pub mod auth;
pub mod blog;
pub mod health;
pub mod media;
pub mod project;
pub mod user;
