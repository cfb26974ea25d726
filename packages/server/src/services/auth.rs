use chrono::{DateTime, Duration, Utc};
use common::{Role, TokenPurpose};
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::entity::{session, user, user_token};
use crate::error::AppError;
use crate::mail::{Mailer, OutboundEmail};
use crate::models::shared::normalize_email;
use crate::utils::hash;
use crate::utils::jwt::JwtKeys;
use crate::utils::token;

/// Tokens handed out by login and refresh.
#[derive(Debug)]
pub struct IssuedTokens {
    pub user: user::Model,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Audit metadata recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct LoginContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Credential store: accounts, password hashes, sessions and one-time tokens.
pub struct AuthService<'a, C: ConnectionTrait + TransactionTrait> {
    conn: &'a C,
    keys: &'a JwtKeys,
    config: &'a AuthConfig,
    mailer: &'a dyn Mailer,
    /// Base for links in outbound mail.
    public_url: &'a str,
}

impl<'a, C: ConnectionTrait + TransactionTrait> AuthService<'a, C> {
    pub fn new(
        conn: &'a C,
        keys: &'a JwtKeys,
        config: &'a AuthConfig,
        mailer: &'a dyn Mailer,
        public_url: &'a str,
    ) -> Self {
        Self {
            conn,
            keys,
            config,
            mailer,
            public_url,
        }
    }

    /// Create an unverified VIEWER account and send its verification email.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<user::Model, AppError> {
        let email = normalize_email(email);

        let exists = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(self.conn)
            .await?
            .is_some();
        if exists {
            return Err(AppError::EmailTaken);
        }

        let password_hash = hash::hash_password_blocking(password.to_string()).await?;

        let now = Utc::now();
        let new_user = user::ActiveModel {
            email: Set(email),
            password_hash: Set(password_hash),
            name: Set(name.trim().to_string()),
            role: Set(Role::Viewer),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = new_user.insert(self.conn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                tracing::debug!("Registration race condition: unique constraint caught on insert");
                AppError::EmailTaken
            }
            _ => AppError::from(e),
        })?;

        info!(user_id = user.id, "User registered");
        self.send_verification(&user).await?;
        Ok(user)
    }

    /// Unknown email and wrong password fail identically, in about the same time.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ctx: LoginContext,
    ) -> Result<IssuedTokens, AppError> {
        let email = normalize_email(email);

        let found = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(self.conn)
            .await?;

        let valid = hash::verify_password_blocking(
            password.to_string(),
            found.as_ref().map(|u| u.password_hash.clone()),
        )
        .await?;

        let user = match found {
            Some(user) if valid => user,
            _ => {
                warn!(ip = ?ctx.ip, "Failed login attempt");
                return Err(AppError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active.last_login_at = Set(Some(now));
        active.last_login_ip = Set(ctx.ip.clone());
        let user = active.update(self.conn).await?;

        let (session, refresh_token) =
            self.create_session(self.conn, user.id, Uuid::now_v7(), &ctx, now).await?;

        info!(user_id = user.id, session_id = %session.id, "User logged in");
        self.issue(user, session.id, refresh_token)
    }

    /// Rotate a refresh token. The presented token is revoked in the same
    /// conditional update that checks it is still live, so two concurrent
    /// exchanges of one token cannot both succeed. Presenting a token that was
    /// already rotated revokes its whole family.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, AppError> {
        let digest = token::digest(refresh_token);
        let now = Utc::now();
        let successor_id = Uuid::now_v7();

        let txn = self.conn.begin().await?;

        let rotated = session::Entity::update_many()
            .col_expr(session::Column::RevokedAt, Expr::value(now))
            .col_expr(session::Column::ReplacedBy, Expr::value(successor_id))
            .filter(session::Column::TokenHash.eq(&digest))
            .filter(session::Column::RevokedAt.is_null())
            .filter(session::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await?;

        let presented = session::Entity::find()
            .filter(session::Column::TokenHash.eq(&digest))
            .one(&txn)
            .await?;

        if rotated.rows_affected != 1 {
            if let Some(s) = presented.filter(|s| s.replaced_by.is_some()) {
                let revoked = revoke_family(&txn, s.family_id, now).await?;
                txn.commit().await?;
                warn!(
                    user_id = s.user_id,
                    family_id = %s.family_id,
                    revoked,
                    "Refresh token reuse detected; session family revoked"
                );
            } else {
                txn.rollback().await?;
            }
            return Err(AppError::TokenInvalid);
        }

        let presented = presented.ok_or(AppError::TokenInvalid)?;
        let user = user::Entity::find_by_id(presented.user_id)
            .one(&txn)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        let ctx = LoginContext {
            ip: presented.ip_address.clone(),
            user_agent: presented.user_agent.clone(),
        };
        let (session, refresh_token) = self
            .insert_session(&txn, successor_id, user.id, presented.family_id, &ctx, now)
            .await?;
        txn.commit().await?;

        self.issue(user, session.id, refresh_token)
    }

    /// Revoke every live session in the caller's family, plus the family of
    /// `refresh_token` when it belongs to the same user. Idempotent.
    pub async fn logout(
        &self,
        user_id: i32,
        session_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut families = Vec::with_capacity(2);

        if let Some(s) = session::Entity::find_by_id(session_id).one(self.conn).await? {
            families.push(s.family_id);
        }
        if let Some(raw) = refresh_token {
            let found = session::Entity::find()
                .filter(session::Column::TokenHash.eq(token::digest(raw)))
                .filter(session::Column::UserId.eq(user_id))
                .one(self.conn)
                .await?;
            if let Some(s) = found
                && !families.contains(&s.family_id)
            {
                families.push(s.family_id);
            }
        }

        let mut revoked = 0;
        for family in families {
            revoked += revoke_family(self.conn, family, now).await?;
        }
        info!(user_id, revoked, "User logged out");
        Ok(revoked)
    }

    /// Revoke all sessions of a user.
    pub async fn logout_all(&self, user_id: i32) -> Result<u64, AppError> {
        let revoked = revoke_user_sessions(self.conn, user_id, None, Utc::now()).await?;
        info!(user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Issue a reset token when the email is known. The caller answers the
    /// same way either way.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        let Some(user) = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(self.conn)
            .await?
        else {
            return Ok(());
        };

        let raw = self
            .issue_user_token(
                user.id,
                TokenPurpose::PasswordReset,
                self.config.password_reset_ttl_secs,
            )
            .await?;

        let link = format!(
            "{}/reset-password?token={}",
            self.public_url.trim_end_matches('/'),
            raw
        );
        self.send(OutboundEmail {
            to: user.email.clone(),
            subject: "Reset your password".into(),
            body: format!(
                "Use the link below to choose a new password. It expires in {} minutes.\n\n{link}\n",
                self.config.password_reset_ttl_secs / 60
            ),
            token: Some(raw),
        })
        .await;
        info!(user_id = user.id, "Password reset requested");
        Ok(())
    }

    /// Consume a reset token, set the new password and end every session.
    pub async fn reset_password(&self, raw: &str, new_password: &str) -> Result<(), AppError> {
        let password_hash = hash::hash_password_blocking(new_password.to_string()).await?;
        let now = Utc::now();

        let txn = self.conn.begin().await?;
        let consumed = consume_user_token(&txn, raw, TokenPurpose::PasswordReset, now).await?;

        let user = user::Entity::find_by_id(consumed.user_id)
            .one(&txn)
            .await?
            .ok_or(AppError::InvalidToken)?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(now);
        let user = active.update(&txn).await?;

        let revoked = revoke_user_sessions(&txn, user.id, None, now).await?;
        txn.commit().await?;

        info!(user_id = user.id, revoked, "Password reset; sessions revoked");
        Ok(())
    }

    pub async fn verify_email(&self, raw: &str) -> Result<user::Model, AppError> {
        let now = Utc::now();
        let txn = self.conn.begin().await?;
        let consumed = consume_user_token(&txn, raw, TokenPurpose::EmailVerification, now).await?;

        let user = user::Entity::find_by_id(consumed.user_id)
            .one(&txn)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let user = if user.email_verified_at.is_none() {
            let mut active: user::ActiveModel = user.into();
            active.email_verified_at = Set(Some(now));
            active.updated_at = Set(now);
            active.update(&txn).await?
        } else {
            user
        };
        txn.commit().await?;

        info!(user_id = user.id, "Email verified");
        Ok(user)
    }

    /// Send a fresh verification link. Returns `false` when the account is
    /// already verified.
    pub async fn resend_verification(&self, user_id: i32) -> Result<bool, AppError> {
        let user = user::Entity::find_by_id(user_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if user.email_verified_at.is_some() {
            return Ok(false);
        }
        self.send_verification(&user).await?;
        Ok(true)
    }

    /// Change the password after re-checking the current one. Sessions of
    /// other logins are revoked; the caller's own family stays signed in.
    pub async fn change_password(
        &self,
        user_id: i32,
        session_id: Uuid,
        current: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = user::Entity::find_by_id(user_id)
            .one(self.conn)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        let valid =
            hash::verify_password_blocking(current.to_string(), Some(user.password_hash.clone()))
                .await?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        let password_hash = hash::hash_password_blocking(new_password.to_string()).await?;
        let now = Utc::now();

        let keep = session::Entity::find_by_id(session_id)
            .one(self.conn)
            .await?
            .map(|s| s.family_id);

        let txn = self.conn.begin().await?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(now);
        active.update(&txn).await?;
        let revoked = revoke_user_sessions(&txn, user_id, keep, now).await?;
        txn.commit().await?;

        info!(user_id, revoked, "Password changed");
        Ok(())
    }

    fn issue(
        &self,
        user: user::Model,
        session_id: Uuid,
        refresh_token: String,
    ) -> Result<IssuedTokens, AppError> {
        let access_token = self
            .keys
            .sign(user.id, user.role, session_id, self.config.access_token_ttl_secs)
            .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

        Ok(IssuedTokens {
            user,
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_secs,
        })
    }

    async fn create_session<T: ConnectionTrait>(
        &self,
        conn: &T,
        user_id: i32,
        family_id: Uuid,
        ctx: &LoginContext,
        now: DateTime<Utc>,
    ) -> Result<(session::Model, String), AppError> {
        self.insert_session(conn, Uuid::now_v7(), user_id, family_id, ctx, now)
            .await
    }

    async fn insert_session<T: ConnectionTrait>(
        &self,
        conn: &T,
        id: Uuid,
        user_id: i32,
        family_id: Uuid,
        ctx: &LoginContext,
        now: DateTime<Utc>,
    ) -> Result<(session::Model, String), AppError> {
        let raw = token::generate();
        let model = session::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            family_id: Set(family_id),
            token_hash: Set(token::digest(&raw)),
            ip_address: Set(ctx.ip.clone()),
            user_agent: Set(ctx.user_agent.clone()),
            expires_at: Set(now + Duration::seconds(self.config.refresh_token_ttl_secs as i64)),
            revoked_at: Set(None),
            replaced_by: Set(None),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
        Ok((model, raw))
    }

    /// Invalidate outstanding tokens of `purpose` and store a new one.
    async fn issue_user_token(
        &self,
        user_id: i32,
        purpose: TokenPurpose,
        ttl_secs: u64,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        user_token::Entity::update_many()
            .col_expr(user_token::Column::ConsumedAt, Expr::value(now))
            .filter(user_token::Column::UserId.eq(user_id))
            .filter(user_token::Column::Purpose.eq(purpose))
            .filter(user_token::Column::ConsumedAt.is_null())
            .exec(self.conn)
            .await?;

        let raw = token::generate();
        user_token::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            purpose: Set(purpose),
            token_hash: Set(token::digest(&raw)),
            expires_at: Set(now + Duration::seconds(ttl_secs as i64)),
            consumed_at: Set(None),
            created_at: Set(now),
        }
        .insert(self.conn)
        .await?;
        Ok(raw)
    }

    async fn send_verification(&self, user: &user::Model) -> Result<(), AppError> {
        let raw = self
            .issue_user_token(
                user.id,
                TokenPurpose::EmailVerification,
                self.config.email_verification_ttl_secs,
            )
            .await?;
        let link = format!(
            "{}/verify-email?token={}",
            self.public_url.trim_end_matches('/'),
            raw
        );
        self.send(OutboundEmail {
            to: user.email.clone(),
            subject: "Verify your email".into(),
            body: format!("Welcome, {}! Confirm your address:\n\n{link}\n", user.name),
            token: Some(raw),
        })
        .await;
        Ok(())
    }

    /// Delivery failures are logged, never surfaced.
    async fn send(&self, email: OutboundEmail) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            warn!(to = %to, error = %e, "Failed to send email");
        }
    }
}

/// Atomically mark a one-time token consumed. Unknown, expired and already
/// consumed tokens all yield `InvalidToken`.
async fn consume_user_token<T: ConnectionTrait>(
    conn: &T,
    raw: &str,
    purpose: TokenPurpose,
    now: DateTime<Utc>,
) -> Result<user_token::Model, AppError> {
    let digest = token::digest(raw);
    let result = user_token::Entity::update_many()
        .col_expr(user_token::Column::ConsumedAt, Expr::value(now))
        .filter(user_token::Column::TokenHash.eq(&digest))
        .filter(user_token::Column::Purpose.eq(purpose))
        .filter(user_token::Column::ConsumedAt.is_null())
        .filter(user_token::Column::ExpiresAt.gt(now))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(AppError::InvalidToken);
    }

    user_token::Entity::find()
        .filter(user_token::Column::TokenHash.eq(&digest))
        .one(conn)
        .await?
        .ok_or(AppError::InvalidToken)
}

async fn revoke_family<T: ConnectionTrait>(
    conn: &T,
    family_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = session::Entity::update_many()
        .col_expr(session::Column::RevokedAt, Expr::value(now))
        .filter(session::Column::FamilyId.eq(family_id))
        .filter(session::Column::RevokedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Revoke a user's live sessions, optionally sparing one family.
pub async fn revoke_user_sessions<T: ConnectionTrait>(
    conn: &T,
    user_id: i32,
    except_family: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let mut update = session::Entity::update_many()
        .col_expr(session::Column::RevokedAt, Expr::value(now))
        .filter(session::Column::UserId.eq(user_id))
        .filter(session::Column::RevokedAt.is_null());
    if let Some(family) = except_family {
        update = update.filter(session::Column::FamilyId.ne(family));
    }
    Ok(update.exec(conn).await?.rows_affected)
}
