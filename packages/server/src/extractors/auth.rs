use std::marker::PhantomData;
use std::ops::Deref;

use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use common::Role;
use uuid::Uuid;

use crate::error::AppError;
use crate::utils::jwt::JwtKeys;

/// Identity resolved from a verified access token.
///
/// The role is the one embedded at issue time; it may lag a role change by
/// at most the access-token lifetime.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
    pub session_id: Uuid,
}

impl AuthUser {
    /// Returns `Ok(())` if the user's role meets `required`, `Err(PermissionDenied)` otherwise.
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.role.at_least(required) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.at_least(Role::Editor)
    }
}

/// Resolve the caller behind an `Authorization` header value and enforce
/// `min_role`.
///
/// Missing header gives `TokenMissing`; a non-Bearer scheme or a bad or
/// expired token gives `TokenInvalid`; a role below `min_role` gives
/// `PermissionDenied`.
pub fn authorize(
    header: Option<&str>,
    keys: &JwtKeys,
    min_role: Role,
) -> Result<AuthUser, AppError> {
    let header = header.ok_or(AppError::TokenMissing)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::TokenInvalid)?;

    let claims = keys.verify(token).map_err(|_| AppError::TokenInvalid)?;

    let user = AuthUser {
        user_id: claims.uid,
        role: claims.role,
        session_id: claims.sid,
    };
    user.require_role(min_role)?;
    Ok(user)
}

fn authorization_header(parts: &Parts) -> Result<Option<&str>, AppError> {
    match parts.headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(v) => v.to_str().map(Some).map_err(|_| AppError::TokenInvalid),
    }
}

/// Any authenticated user.
impl<S> FromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authorize(authorization_header(parts)?, &keys, Role::Viewer)
    }
}

/// `Option<AuthUser>`: anonymous when no header is sent, rejected when a
/// header is sent but does not verify.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match authorization_header(parts)? {
            None => Ok(None),
            Some(header) => {
                let keys = JwtKeys::from_ref(state);
                authorize(Some(header), &keys, Role::Viewer).map(Some)
            }
        }
    }
}

/// Minimum role required by an [`Authorized`] extractor.
pub trait RoleGate: Send + Sync + 'static {
    const MIN_ROLE: Role;
}

pub struct EditorGate;
pub struct AdminGate;

impl RoleGate for EditorGate {
    const MIN_ROLE: Role = Role::Editor;
}
impl RoleGate for AdminGate {
    const MIN_ROLE: Role = Role::Admin;
}

/// An authenticated user whose role is at least `G::MIN_ROLE`.
///
/// Extraction runs before the body is read, so a rejected request performs
/// no work.
pub struct Authorized<G: RoleGate> {
    pub user: AuthUser,
    _gate: PhantomData<G>,
}

impl<G: RoleGate> Deref for Authorized<G> {
    type Target = AuthUser;

    fn deref(&self) -> &AuthUser {
        &self.user
    }
}

impl<S, G> FromRequestParts<S> for Authorized<G>
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
    G: RoleGate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let user = authorize(authorization_header(parts)?, &keys, G::MIN_ROLE)?;
        Ok(Authorized {
            user,
            _gate: PhantomData,
        })
    }
}

pub type EditorUser = Authorized<EditorGate>;
pub type AdminUser = Authorized<AdminGate>;
