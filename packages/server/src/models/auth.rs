use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::shared::{Issues, check_email, check_len, check_password};
use crate::models::user::UserResponse;

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada@studio.example")]
    pub email: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    /// Display name (1-100 characters).
    #[schema(example = "Ada Lovelace")]
    pub name: String,
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    issues.check("email", check_email(&payload.email));
    issues.check("password", check_password(&payload.password));
    issues.check("name", check_len(&payload.name, "Name", 1, 100));
    issues.finish()
}

/// Request body for user login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@studio.example")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if payload.email.trim().is_empty() {
        issues.add("email", "Email must not be empty");
    }
    if payload.password.is_empty() {
        issues.add("password", "Password must not be empty");
    }
    issues.finish()
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    /// Opaque refresh token from login or a previous refresh.
    pub refresh_token: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LogoutRequest {
    /// Optional; when present its session family is revoked as well.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ForgotPasswordRequest {
    #[schema(example = "ada@studio.example")]
    pub email: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    /// Token from the reset email.
    pub token: String,
    /// New password (8-128 characters).
    pub password: String,
}

pub fn validate_reset_password_request(payload: &ResetPasswordRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if payload.token.trim().is_empty() {
        issues.add("token", "Token must not be empty");
    }
    issues.check("password", check_password(&payload.password));
    issues.finish()
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    /// New password (8-128 characters).
    pub new_password: String,
}

pub fn validate_change_password_request(payload: &ChangePasswordRequest) -> Result<(), AppError> {
    let mut issues = Issues::new();
    if payload.current_password.is_empty() {
        issues.add("current_password", "Current password must not be empty");
    }
    issues.check("new_password", check_password(&payload.new_password));
    issues.finish()
}

/// Access/refresh token pair.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TokenPair {
    /// Short-lived JWT for the `Authorization: Bearer` header.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Opaque single-use token for `/auth/refresh`.
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    #[schema(example = 900)]
    pub expires_in: u64,
}

/// Successful login or refresh.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Successful registration response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    #[schema(example = "Registration successful. Check your email to verify your account.")]
    pub message: String,
}
