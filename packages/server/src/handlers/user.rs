use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AdminUser, AuthUser};
use crate::extractors::json::AppJson;
use crate::models::auth::{ChangePasswordRequest, validate_change_password_request};
use crate::models::shared::{ApiOk, Data, MessageResponse};
use crate::models::user::*;
use crate::services::auth::AuthService;
use crate::services::user::UserService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    operation_id = "getProfile",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    let user = UserService::new(&state.db).me(auth_user.user_id).await?;
    Ok(Json(ApiOk::data(user.into())))
}

#[utoipa::path(
    put,
    path = "/me",
    tag = "Users",
    operation_id = "updateProfile",
    summary = "Update own profile",
    description = "Omitted fields are left unchanged; `null` clears `avatar_url` or `bio`.",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn update_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    validate_update_profile(&payload)?;
    let user = UserService::new(&state.db)
        .update_profile(auth_user.user_id, payload)
        .await?;
    Ok(Json(ApiOk::data(user.into())))
}

#[utoipa::path(
    put,
    path = "/me/password",
    tag = "Users",
    operation_id = "changePassword",
    summary = "Change own password",
    description = "Requires the current password. Other logins are signed out; the calling session stays valid.",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong current password (INVALID_CREDENTIALS) or bad token", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    validate_change_password_request(&payload)?;
    AuthService::new(
        &state.db,
        &state.jwt,
        &state.config.auth,
        state.mailer.as_ref(),
        &state.config.server.public_url,
    )
    .change_password(
        auth_user.user_id,
        auth_user.session_id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(ApiOk::new(MessageResponse::new("Password changed"))))
}

#[utoipa::path(
    get,
    path = "/me/export",
    tag = "Users",
    operation_id = "exportProfile",
    summary = "Export own data",
    description = "Profile, sessions, authored posts and projects, and uploaded media. Credentials are never included.",
    responses(
        (status = 200, description = "Export", body = UserExport),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn export_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<UserExport>>>, AppError> {
    let export = UserService::new(&state.db)
        .export(auth_user.user_id, state.storage.as_ref())
        .await?;
    Ok(Json(ApiOk::data(export)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users",
    description = "Requires ADMIN. Searches email and name case-insensitively.",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _admin, query))]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiOk<UserListResponse>>, AppError> {
    let users = UserService::new(&state.db).list(&query).await?;
    Ok(Json(ApiOk::new(users)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user",
    description = "Requires ADMIN.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    let user = UserService::new(&state.db).get(id).await?;
    Ok(Json(ApiOk::data(user.into())))
}

#[utoipa::path(
    put,
    path = "/{id}/role",
    tag = "Users",
    operation_id = "changeUserRole",
    summary = "Change a user's role",
    description = "Requires ADMIN. Nobody can change their own role. Admins act only on users below them \
        and grant only roles below their own; SUPER_ADMIN may grant any role. The new role applies to \
        access tokens issued after the change.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(actor_id = admin.user_id, role = %payload.role))]
pub async fn change_role(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ChangeRoleRequest>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    let user = UserService::new(&state.db)
        .change_role(&admin, id, payload.role)
        .await?;
    Ok(Json(ApiOk::data(user.into())))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Users",
    operation_id = "deleteUser",
    summary = "Delete a user",
    description = "Requires ADMIN and a target below the caller's role. Sessions and pending tokens are \
        deleted; posts, projects and media stay, without an author.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin), fields(actor_id = admin.user_id))]
pub async fn delete_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    UserService::new(&state.db).delete(&admin, id).await?;
    Ok(Json(ApiOk::new(MessageResponse::new("User deleted"))))
}
