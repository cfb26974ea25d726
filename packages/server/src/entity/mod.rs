pub mod blog_post;
pub mod media_asset;
pub mod project;
pub mod project_image;
pub mod session;
pub mod user;
pub mod user_token;
