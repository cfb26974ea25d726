use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, EditorUser};
use crate::extractors::json::AppJson;
use crate::models::blog::*;
use crate::models::shared::{ApiOk, Data, MessageResponse};
use crate::services::blog::BlogService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Blog",
    operation_id = "listPosts",
    summary = "List blog posts",
    description = "Public. Anonymous callers and VIEWERs see published posts only, newest first. \
        EDITORs and above see every status and may filter by it. Supports title search, tag filter \
        and sorting by `published_at`, `created_at`, `view_count` or `title`.",
    params(PostListQuery),
    responses(
        (status = 200, description = "Posts", body = PostListResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_posts(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<ApiOk<PostListResponse>>, AppError> {
    let posts = BlogService::new(&state.db)
        .list(&query, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::new(posts)))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Blog",
    operation_id = "createPost",
    summary = "Create a draft post",
    description = "Requires EDITOR. The slug is derived from the title when omitted.",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Slug in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor, payload), fields(author_id = editor.user_id, title = %payload.title))]
pub async fn create_post(
    editor: EditorUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_post(&payload)?;
    let post = BlogService::new(&state.db)
        .create(payload, editor.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOk::data(PostResponse::from(post)))))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Blog",
    operation_id = "getBlogStats",
    summary = "Blog statistics",
    description = "Requires EDITOR. Counts per status, total views, the five most viewed published posts and tag usage.",
    responses(
        (status = 200, description = "Statistics", body = BlogStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn blog_stats(
    _editor: EditorUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<BlogStats>>>, AppError> {
    let stats = BlogService::new(&state.db).stats().await?;
    Ok(Json(ApiOk::data(stats)))
}

#[utoipa::path(
    get,
    path = "/slug/{slug}",
    tag = "Blog",
    operation_id = "getPostBySlug",
    summary = "Read a post by slug",
    description = "Public for published posts, and counts a view. Drafts and archived posts are visible to EDITORs only.",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_post_by_slug(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiOk<Data<PostResponse>>>, AppError> {
    let post = BlogService::new(&state.db)
        .get_by_slug(&slug, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::data(post.into())))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Blog",
    operation_id = "getPost",
    summary = "Get a post by ID",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_post(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<PostResponse>>>, AppError> {
    let post = BlogService::new(&state.db)
        .get(id, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::data(post.into())))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Blog",
    operation_id = "updatePost",
    summary = "Update a post",
    description = "Requires EDITOR. Archived posts are read-only.",
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = PostResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug in use or post archived (CONFLICT, INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor, payload))]
pub async fn update_post(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> Result<Json<ApiOk<Data<PostResponse>>>, AppError> {
    validate_update_post(&payload)?;
    let post = BlogService::new(&state.db).update(id, payload).await?;
    Ok(Json(ApiOk::data(post.into())))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Blog",
    operation_id = "deletePost",
    summary = "Delete a post",
    description = "Requires EDITOR and authorship, or ADMIN.",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor), fields(actor_id = editor.user_id))]
pub async fn delete_post(
    editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    BlogService::new(&state.db).delete(id, &editor).await?;
    Ok(Json(ApiOk::new(MessageResponse::new("Post deleted"))))
}

#[utoipa::path(
    post,
    path = "/{id}/publish",
    tag = "Blog",
    operation_id = "publishPost",
    summary = "Publish a post",
    description = "Requires EDITOR. DRAFT becomes PUBLISHED; publishing a published post changes nothing. \
        Archived posts cannot be published.",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Published post", body = PostResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Post is archived (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn publish_post(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<PostResponse>>>, AppError> {
    let post = BlogService::new(&state.db).publish(id).await?;
    Ok(Json(ApiOk::data(post.into())))
}

#[utoipa::path(
    post,
    path = "/{id}/archive",
    tag = "Blog",
    operation_id = "archivePost",
    summary = "Archive a post",
    description = "Requires EDITOR. Archiving is final.",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Archived post", body = PostResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn archive_post(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<PostResponse>>>, AppError> {
    let post = BlogService::new(&state.db).archive(id).await?;
    Ok(Json(ApiOk::data(post.into())))
}
