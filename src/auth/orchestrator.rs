//! Auth orchestrator (§4.F): composes the token store, token codec, and
//! SMS controller to realise register / login / refresh / logout /
//! reset-password / validate. Enforces the login-attempt limiter.
//!
//! Every entry point returns `Result<T, AppError>` — the tagged sum the
//! spec calls `Ok(T) | Fail(code, message)` — and never leaks a panic or a
//! raw `sqlx`/cache error across the boundary; repository calls already
//! normalise those via `From<sqlx::Error> for AppError` etc.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::login_limiter::LoginLimiter;
use crate::config::Config;
use crate::error::{AppError, ErrorCode};
use crate::models::{SmsScene, TokenPair, User, UserResponse};
use crate::repositories::{token as token_repo, user as user_repo};
use crate::sms::controller::SmsController;
use crate::token::codec::TokenCodec;
use crate::types::UserUuid;
use crate::utils::password::{hash_password, verify_password};
use crate::validation;

pub struct AuthOrchestrator {
    pool: PgPool,
    codec: TokenCodec,
    sms: Arc<SmsController>,
    login_limiter: Arc<LoginLimiter>,
    config: Config,
}

pub struct AuthResult {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

impl AuthOrchestrator {
    pub fn new(
        pool: PgPool,
        codec: TokenCodec,
        sms: Arc<SmsController>,
        login_limiter: Arc<LoginLimiter>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            codec,
            sms,
            login_limiter,
            config,
        }
    }

    async fn issue_and_persist(&self, user: &User) -> Result<TokenPair, AppError> {
        let tokens = self.codec.issue(user)?;
        let fingerprint = TokenCodec::fingerprint(&tokens.refresh);
        token_repo::save_refresh(&self.pool, user.id, &fingerprint, self.codec.refresh_ttl_seconds()).await?;
        Ok(tokens)
    }

    /// Issues an SMS code for `scene`; returns the resend interval in seconds.
    pub async fn send_verification_code(&self, scene: SmsScene, mobile: &str) -> Result<i64, AppError> {
        validation::validate_mobile(mobile)?;
        self.sms.issue(scene, mobile).await
    }

    pub async fn register(
        &self,
        mobile: &str,
        code: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResult, AppError> {
        validation::validate_mobile(mobile)?;
        validation::validate_password(password, &self.config)?;
        validation::validate_sms_code(code, self.config.sms_code_len)?;
        validation::validate_display_name(display_name)?;

        self.sms.verify(SmsScene::Register, mobile, code).await?;

        if user_repo::find_by_mobile(&self.pool, mobile).await?.is_some() {
            return Err(AppError::new(ErrorCode::MobileTaken, "mobile already registered"));
        }

        let hash = hash_password(password).map_err(AppError::Internal)?;
        let user = user_repo::insert(&self.pool, mobile, &hash, display_name)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::new(ErrorCode::MobileTaken, "mobile already registered")
                }
                other => AppError::from(other),
            })?;

        let tokens = self.issue_and_persist(&user).await?;
        self.sms.consume(SmsScene::Register, mobile).await?;

        Ok(AuthResult {
            user: user.into(),
            tokens,
        })
    }

    pub async fn login_by_password(&self, mobile: &str, password: &str) -> Result<AuthResult, AppError> {
        self.login_limiter.check(mobile).await?;

        let user = match user_repo::find_by_mobile(&self.pool, mobile).await? {
            Some(user) => user,
            None => {
                self.login_limiter.record_failure(mobile).await?;
                return Err(AppError::new(ErrorCode::WrongPassword, "wrong mobile or password"));
            }
        };

        if user.disabled {
            return Err(AppError::new(ErrorCode::UserDisabled, "account disabled"));
        }

        let matches = verify_password(password, &user.password_hash).map_err(AppError::Internal)?;
        if !matches {
            self.login_limiter.record_failure(mobile).await?;
            return Err(AppError::new(ErrorCode::WrongPassword, "wrong mobile or password"));
        }

        self.login_limiter.clear(mobile).await?;
        let tokens = self.issue_and_persist(&user).await?;
        Ok(AuthResult {
            user: user.into(),
            tokens,
        })
    }

    pub async fn login_by_code(&self, mobile: &str, code: &str) -> Result<AuthResult, AppError> {
        self.sms.verify(SmsScene::Login, mobile, code).await?;

        let user = user_repo::find_by_mobile(&self.pool, mobile)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "no account for this mobile"))?;

        if user.disabled {
            return Err(AppError::new(ErrorCode::UserDisabled, "account disabled"));
        }

        self.login_limiter.clear(mobile).await?;
        let tokens = self.issue_and_persist(&user).await?;
        self.sms.consume(SmsScene::Login, mobile).await?;

        Ok(AuthResult {
            user: user.into(),
            tokens,
        })
    }

    /// Rotation is atomic only in spirit: deletion precedes issuance so
    /// that, on crash between them, the worst case is a single expired
    /// entry swept by the sweeper. The old refresh is never reusable again.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenPair, AppError> {
        let user_id = self.codec.parse_refresh(refresh)?;
        let old_fingerprint = TokenCodec::fingerprint(refresh);

        if !token_repo::is_valid(&self.pool, &old_fingerprint).await? {
            return Err(AppError::new(ErrorCode::TokenRevoked, "refresh token revoked or expired"));
        }

        let user = user_repo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user no longer exists"))?;
        if user.disabled {
            return Err(AppError::new(ErrorCode::UserDisabled, "account disabled"));
        }

        token_repo::delete_by_fingerprint(&self.pool, &old_fingerprint).await?;
        self.issue_and_persist(&user).await
    }

    pub async fn logout(&self, refresh: &str) -> Result<(), AppError> {
        if refresh.is_empty() {
            return Ok(());
        }
        let fingerprint = TokenCodec::fingerprint(refresh);
        token_repo::delete_by_fingerprint(&self.pool, &fingerprint).await
    }

    pub async fn logout_all(&self, user_uuid: &UserUuid) -> Result<(), AppError> {
        let user = user_repo::find_by_uuid(&self.pool, user_uuid)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
        token_repo::delete_by_user(&self.pool, user.id).await?;
        Ok(())
    }

    pub async fn reset_password(&self, mobile: &str, code: &str, new_password: &str) -> Result<(), AppError> {
        validation::validate_password(new_password, &self.config)?;
        self.sms.verify(SmsScene::ResetPassword, mobile, code).await?;

        let user = user_repo::find_by_mobile(&self.pool, mobile)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "no account for this mobile"))?;

        let hash = hash_password(new_password).map_err(AppError::Internal)?;
        user_repo::update_password(&self.pool, user.id, &hash).await?;
        token_repo::delete_by_user(&self.pool, user.id).await?;
        self.sms.consume(SmsScene::ResetPassword, mobile).await?;
        Ok(())
    }

    /// Self-service change (bearer-authenticated caller already holds a
    /// valid access token); does not require an SMS code.
    pub async fn change_password(&self, user_id: i64, current_password: &str, new_password: &str) -> Result<(), AppError> {
        validation::validate_password(new_password, &self.config)?;
        let user = user_repo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let matches = verify_password(current_password, &user.password_hash).map_err(AppError::Internal)?;
        if !matches {
            return Err(AppError::new(ErrorCode::WrongPassword, "current password is incorrect"));
        }

        let hash = hash_password(new_password).map_err(AppError::Internal)?;
        user_repo::update_password(&self.pool, user.id, &hash).await?;
        token_repo::delete_by_user(&self.pool, user.id).await?;
        Ok(())
    }

    /// SMS-gated self-service account deletion. Soft-deletes (flips
    /// `disabled`) rather than removing the row, since `user_sessions` and
    /// any future audit trail still reference the user by id.
    pub async fn delete_account(&self, mobile: &str, code: &str) -> Result<(), AppError> {
        self.sms.verify(SmsScene::DeleteUser, mobile, code).await?;

        let user = user_repo::find_by_mobile(&self.pool, mobile)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "no account for this mobile"))?;

        user_repo::set_disabled(&self.pool, user.id, true).await?;
        token_repo::delete_by_user(&self.pool, user.id).await?;
        self.sms.consume(SmsScene::DeleteUser, mobile).await?;
        Ok(())
    }

    /// Sidecar RPC for peer services: surfaces `{uuid, mobile, role, expires_at}`.
    pub fn validate_access_token(&self, token: &str) -> Result<crate::models::AccessPayload, AppError> {
        self.codec.verify_access(token)
    }

    /// Admin-only: flips `disabled` for the account at `uuid`. Disabling
    /// also revokes every outstanding refresh session, since a disabled
    /// user owns no live `RefreshSession`.
    pub async fn set_user_disabled(&self, uuid: &UserUuid, disabled: bool) -> Result<UserResponse, AppError> {
        let user = user_repo::find_by_uuid(&self.pool, uuid)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        user_repo::set_disabled(&self.pool, user.id, disabled).await?;
        if disabled {
            token_repo::delete_by_user(&self.pool, user.id).await?;
        }

        let user = user_repo::find_by_id(&self.pool, user.id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
        Ok(user.into())
    }
}
