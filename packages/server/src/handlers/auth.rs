use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::client::ClientInfo;
use crate::extractors::json::AppJson;
use crate::models::auth::*;
use crate::models::shared::{ApiOk, Data, MessageResponse};
use crate::models::user::UserResponse;
use crate::services::auth::{AuthService, IssuedTokens, LoginContext};
use crate::services::user::UserService;
use crate::state::AppState;

fn auth_service(state: &AppState) -> AuthService<'_, sea_orm::DatabaseConnection> {
    AuthService::new(
        &state.db,
        &state.jwt,
        &state.config.auth,
        state.mailer.as_ref(),
        &state.config.server.public_url,
    )
}

fn auth_response(issued: IssuedTokens) -> AuthResponse {
    AuthResponse {
        user: issued.user.into(),
        tokens: TokenPair {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            token_type: "Bearer",
            expires_in: issued.expires_in,
        },
    }
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates an unverified VIEWER account and emails a verification link. Rate limited per client IP.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Email already registered (EMAIL_TAKEN)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register_request(&payload)?;

    let user = auth_service(&state)
        .register(&payload.email, &payload.password, &payload.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new(RegisterResponse {
            user: user.into(),
            message: "Registration successful. Check your email to verify your account.".into(),
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in with email and password",
    description = "Returns an access token and a single-use refresh token. Unknown emails and wrong passwords get the same response.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Invalid credentials (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, client, payload))]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<ApiOk<AuthResponse>>, AppError> {
    validate_login_request(&payload)?;

    let issued = auth_service(&state)
        .login(
            &payload.email,
            &payload.password,
            LoginContext {
                ip: client.ip,
                user_agent: client.user_agent,
            },
        )
        .await?;

    Ok(Json(ApiOk::new(auth_response(issued))))
}

#[utoipa::path(
    post,
    path = "/refresh",
    tag = "Auth",
    operation_id = "refreshToken",
    summary = "Exchange a refresh token",
    description = "Rotates the refresh token: the presented token is revoked and a new pair is issued. \
        Presenting an already exchanged token revokes every session of that login.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = AuthResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Token expired, revoked or unknown (TOKEN_INVALID)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<ApiOk<AuthResponse>>, AppError> {
    let token = payload.refresh_token.trim();
    if token.is_empty() {
        return Err(AppError::TokenInvalid);
    }
    let issued = auth_service(&state).refresh(token).await?;
    Ok(Json(ApiOk::new(auth_response(issued))))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    operation_id = "logout",
    summary = "Log out the current session",
    description = "Revokes the refresh-token chain of the calling session. An optional JSON body \
        `{\"refresh_token\": ...}` also revokes that token's chain. Calling it again is not an error.",
    request_body(content = LogoutRequest, description = "Optional refresh token"),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 400, description = "Malformed body (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, body), fields(user_id = auth_user.user_id))]
pub async fn logout(
    auth_user: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    let payload: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest { refresh_token: None }
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?
    };

    auth_service(&state)
        .logout(
            auth_user.user_id,
            auth_user.session_id,
            payload.refresh_token.as_deref(),
        )
        .await?;

    Ok(Json(ApiOk::new(MessageResponse::new("Logged out"))))
}

#[utoipa::path(
    post,
    path = "/logout-all",
    tag = "Auth",
    operation_id = "logoutAll",
    summary = "Log out everywhere",
    description = "Revokes every refresh token of the caller. Access tokens already issued stay valid until they expire.",
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn logout_all(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    let revoked = auth_service(&state).logout_all(auth_user.user_id).await?;
    Ok(Json(ApiOk::new(MessageResponse::new(format!(
        "Revoked {revoked} session(s)"
    )))))
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "Auth",
    operation_id = "forgotPassword",
    summary = "Request a password reset email",
    description = "Always answers with the same message, whether or not the email is registered.",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    auth_service(&state).forgot_password(&payload.email).await?;
    Ok(Json(ApiOk::new(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent.",
    ))))
}

#[utoipa::path(
    post,
    path = "/reset-password",
    tag = "Auth",
    operation_id = "resetPassword",
    summary = "Set a new password with a reset token",
    description = "Consumes the reset token, sets the new password and revokes every session of the account.",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Validation error or bad token (VALIDATION_ERROR, INVALID_TOKEN)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    validate_reset_password_request(&payload)?;
    auth_service(&state)
        .reset_password(payload.token.trim(), &payload.password)
        .await?;
    Ok(Json(ApiOk::new(MessageResponse::new(
        "Password has been reset. Please log in again.",
    ))))
}

#[utoipa::path(
    post,
    path = "/verify-email",
    tag = "Auth",
    operation_id = "verifyEmail",
    summary = "Confirm an email address",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Unknown, expired or used token (INVALID_TOKEN)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidToken);
    }
    let user = auth_service(&state).verify_email(token).await?;
    Ok(Json(ApiOk::data(user.into())))
}

#[utoipa::path(
    post,
    path = "/resend-verification",
    tag = "Auth",
    operation_id = "resendVerification",
    summary = "Send a new verification email",
    responses(
        (status = 200, description = "Email sent, or account already verified", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn resend_verification(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<MessageResponse>>, AppError> {
    let sent = auth_service(&state)
        .resend_verification(auth_user.user_id)
        .await?;
    let message = if sent {
        "Verification email sent"
    } else {
        "Email is already verified"
    };
    Ok(Json(ApiOk::new(MessageResponse::new(message))))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "getCurrentUser",
    summary = "Get the authenticated user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Data<UserResponse>>>, AppError> {
    let user = UserService::new(&state.db).me(auth_user.user_id).await?;
    Ok(Json(ApiOk::data(user.into())))
}
