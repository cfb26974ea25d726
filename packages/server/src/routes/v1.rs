use axum::middleware;
use axum::routing::get;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::rate_limit::rate_limit_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes(state))
        .nest("/users", user_routes())
        .nest("/blog", blog_routes())
        .nest("/projects", project_routes())
        .nest("/media", media_routes(state))
}

fn auth_routes(state: &AppState) -> OpenApiRouter<AppState> {
    let limited = OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::refresh))
        .routes(routes!(handlers::auth::forgot_password))
        .routes(routes!(handlers::auth::reset_password))
        .routes(routes!(handlers::auth::verify_email))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth));

    OpenApiRouter::new()
        .routes(routes!(handlers::auth::logout))
        .routes(routes!(handlers::auth::logout_all))
        .routes(routes!(handlers::auth::me))
        .routes(routes!(handlers::auth::resend_verification))
        .merge(limited)
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::user::list_users))
        .routes(routes!(
            handlers::user::get_profile,
            handlers::user::update_profile
        ))
        .routes(routes!(handlers::user::change_password))
        .routes(routes!(handlers::user::export_profile))
        .routes(routes!(handlers::user::get_user, handlers::user::delete_user))
        .routes(routes!(handlers::user::change_role))
}

fn blog_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::blog::list_posts,
            handlers::blog::create_post
        ))
        .routes(routes!(handlers::blog::blog_stats))
        .routes(routes!(handlers::blog::get_post_by_slug))
        .routes(routes!(
            handlers::blog::get_post,
            handlers::blog::update_post,
            handlers::blog::delete_post
        ))
        .routes(routes!(handlers::blog::publish_post))
        .routes(routes!(handlers::blog::archive_post))
}

fn project_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::project::list_projects,
            handlers::project::create_project
        ))
        .routes(routes!(handlers::project::project_stats))
        .routes(routes!(handlers::project::get_project_by_slug))
        .routes(routes!(
            handlers::project::get_project,
            handlers::project::update_project,
            handlers::project::delete_project
        ))
        .routes(routes!(handlers::project::publish_project))
        .routes(routes!(handlers::project::archive_project))
        .routes(routes!(handlers::project::add_image))
        .routes(routes!(handlers::project::remove_image))
}

fn media_routes(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::media::list_media,
            handlers::media::create_media
        ))
        .routes(routes!(handlers::media::upload_media))
        .routes(routes!(handlers::media::media_stats))
        .routes(routes!(
            handlers::media::get_media,
            handlers::media::update_media,
            handlers::media::delete_media
        ))
        .routes(routes!(handlers::media::signed_url))
        .route("/files/{*key}", get(handlers::media::serve_file))
        .layer(handlers::media::upload_body_limit(&state.config.media))
}
