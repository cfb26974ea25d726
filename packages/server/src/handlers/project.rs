use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, EditorUser};
use crate::extractors::json::AppJson;
use crate::models::project::*;
use crate::models::shared::{ApiOk, Data, MessageResponse};
use crate::services::project::ProjectService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Projects",
    operation_id = "listProjects",
    summary = "List portfolio projects",
    description = "Public. Non-staff callers see published projects only. Filters: `category`, `featured`, \
        title `search`, and `status` for EDITORs.",
    params(ProjectListQuery),
    responses(
        (status = 200, description = "Projects", body = ProjectListResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_projects(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<ApiOk<ProjectListResponse>>, AppError> {
    let projects = ProjectService::new(&state.db)
        .list(&query, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::new(projects)))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Projects",
    operation_id = "createProject",
    summary = "Create a draft project",
    description = "Requires EDITOR.",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Slug in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor, payload), fields(author_id = editor.user_id, title = %payload.title))]
pub async fn create_project(
    editor: EditorUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_project(&payload)?;
    let project = ProjectService::new(&state.db)
        .create(payload, editor.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOk::data(project))))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Projects",
    operation_id = "getProjectStats",
    summary = "Project statistics",
    description = "Requires EDITOR.",
    responses(
        (status = 200, description = "Statistics", body = ProjectStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn project_stats(
    _editor: EditorUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<ProjectStats>>>, AppError> {
    let stats = ProjectService::new(&state.db).stats().await?;
    Ok(Json(ApiOk::data(stats)))
}

#[utoipa::path(
    get,
    path = "/slug/{slug}",
    tag = "Projects",
    operation_id = "getProjectBySlug",
    summary = "Read a project by slug",
    description = "Public for published projects, and counts a view.",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 200, description = "Project with gallery", body = ProjectResponse),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_project_by_slug(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiOk<Data<ProjectResponse>>>, AppError> {
    let project = ProjectService::new(&state.db)
        .get_by_slug(&slug, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::data(project)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Projects",
    operation_id = "getProject",
    summary = "Get a project by ID",
    params(("id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project with gallery", body = ProjectResponse),
        (status = 401, description = "Bad token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_project(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<ProjectResponse>>>, AppError> {
    let project = ProjectService::new(&state.db)
        .get(id, auth_user.as_ref().is_some_and(AuthUser::is_staff))
        .await?;
    Ok(Json(ApiOk::data(project)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Projects",
    operation_id = "updateProject",
    summary = "Update a project",
    description = "Requires EDITOR. Archived projects are read-only.",
    params(("id" = i32, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = ProjectResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug in use or project archived (CONFLICT, INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor, payload))]
pub async fn update_project(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateProjectRequest>,
) -> Result<Json<ApiOk<Data<ProjectResponse>>>, AppError> {
    validate_update_project(&payload)?;
    let project = ProjectService::new(&state.db).update(id, payload).await?;
    Ok(Json(ApiOk::data(project)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Projects",
    operation_id = "deleteProject",
    summary = "Delete a project and its gallery",
    description = "Requires EDITOR and authorship, or ADMIN. Media assets used in the gallery are kept.",
    params(("id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, editor), fields(actor_id = editor.user_id))]
pub async fn delete_project(
    editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    ProjectService::new(&state.db).delete(id, &editor).await?;
    Ok(Json(ApiOk::new(MessageResponse::new("Project deleted"))))
}

#[utoipa::path(
    post,
    path = "/{id}/publish",
    tag = "Projects",
    operation_id = "publishProject",
    summary = "Publish a project",
    description = "Requires EDITOR. Archived projects cannot be published.",
    params(("id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Published project", body = ProjectResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Project is archived (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn publish_project(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<ProjectResponse>>>, AppError> {
    let project = ProjectService::new(&state.db).publish(id).await?;
    Ok(Json(ApiOk::data(project)))
}

#[utoipa::path(
    post,
    path = "/{id}/archive",
    tag = "Projects",
    operation_id = "archiveProject",
    summary = "Archive a project",
    description = "Requires EDITOR. Archiving is final.",
    params(("id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Archived project", body = ProjectResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn archive_project(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<ProjectResponse>>>, AppError> {
    let project = ProjectService::new(&state.db).archive(id).await?;
    Ok(Json(ApiOk::data(project)))
}

#[utoipa::path(
    post,
    path = "/{id}/images",
    tag = "Projects",
    operation_id = "addProjectImage",
    summary = "Add an image to the gallery",
    description = "Requires EDITOR. Give either `media_id` of an uploaded asset or an explicit `url`. \
        Without `position` the image is appended.",
    params(("id" = i32, Path, description = "Project ID")),
    request_body = AddImageRequest,
    responses(
        (status = 201, description = "Image added", body = ProjectImageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project or media not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Project is archived (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor, payload))]
pub async fn add_image(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AddImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_add_image(&payload)?;
    let image = ProjectService::new(&state.db)
        .add_image(id, payload, state.storage.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiOk::data(image))))
}

#[utoipa::path(
    delete,
    path = "/{id}/images/{image_id}",
    tag = "Projects",
    operation_id = "removeProjectImage",
    summary = "Remove an image from the gallery",
    description = "Requires EDITOR. The underlying media asset is kept.",
    params(
        ("id" = i32, Path, description = "Project ID"),
        ("image_id" = i32, Path, description = "Image ID"),
    ),
    responses(
        (status = 200, description = "Image removed", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Project or image not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _editor))]
pub async fn remove_image(
    _editor: EditorUser,
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i32, i32)>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    ProjectService::new(&state.db)
        .remove_image(id, image_id)
        .await?;
    Ok(Json(ApiOk::new(MessageResponse::new("Image removed"))))
}
