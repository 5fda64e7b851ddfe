//! Error taxonomy and its mapping onto the RPC envelope.
//!
//! Numeric codes are grouped by thousands exactly as the wire contract
//! requires: System (100), Input (200), Rate (300), Auth (1000), User
//! (2000), Permission (3000). Handlers never construct the envelope by
//! hand — they return [`AppError`] and `IntoResponse` does the mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown = 100,
    Internal = 101,
    NotImplemented = 102,
    ServiceUnavailable = 103,
    Timeout = 104,

    InvalidArgument = 200,
    InvalidPage = 201,
    InvalidPageSize = 202,

    RateLimited = 300,
    QuotaExceeded = 301,

    Unauthenticated = 1000,
    TokenMissing = 1001,
    TokenInvalid = 1002,
    TokenExpired = 1003,
    TokenRevoked = 1004,
    LoginFailed = 1005,
    WrongPassword = 1006,
    AccountLocked = 1007,
    CaptchaWrong = 1008,
    CaptchaExpired = 1009,

    UserNotFound = 2000,
    UserDeleted = 2001,
    UserAlreadyExists = 2002,
    MobileTaken = 2003,
    UserDisabled = 2004,
    UserNotVerified = 2005,

    PermissionDenied = 3000,
    AdminRequired = 3001,
    OwnerRequired = 3002,
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    fn http_status(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            Unknown | Internal | NotImplemented => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Timeout => StatusCode::GATEWAY_TIMEOUT,
            InvalidArgument | InvalidPage | InvalidPageSize => StatusCode::BAD_REQUEST,
            RateLimited | QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Unauthenticated | TokenMissing | TokenInvalid | TokenExpired | TokenRevoked => {
                StatusCode::UNAUTHORIZED
            }
            LoginFailed | WrongPassword | AccountLocked | CaptchaWrong | CaptchaExpired => {
                StatusCode::UNAUTHORIZED
            }
            UserNotFound | UserDeleted => StatusCode::NOT_FOUND,
            UserAlreadyExists | MobileTaken => StatusCode::CONFLICT,
            UserDisabled | UserNotVerified => StatusCode::FORBIDDEN,
            PermissionDenied | AdminRequired | OwnerRequired => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: u32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<FieldError>>,
}

/// The tagged `Ok(T) | Fail(code, message)` sum every orchestrator entry
/// point returns, surfaced at the axum boundary via `IntoResponse`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{1}")]
    Tagged(ErrorCode, String),
    #[error("{0}")]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::Tagged(code, msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Tagged(code, _) => *code,
            AppError::Validation(_) => ErrorCode::InvalidArgument,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

macro_rules! ctor {
    ($name:ident, $code:ident) => {
        pub fn $name(msg: impl Into<String>) -> AppError {
            AppError::Tagged(ErrorCode::$code, msg.into())
        }
    };
}

ctor!(service_unavailable, ServiceUnavailable);
ctor!(invalid_argument, InvalidArgument);
ctor!(rate_limited, RateLimited);
ctor!(unauthenticated, Unauthenticated);
ctor!(token_missing, TokenMissing);
ctor!(token_invalid, TokenInvalid);
ctor!(token_expired, TokenExpired);
ctor!(token_revoked, TokenRevoked);
ctor!(wrong_password, WrongPassword);
ctor!(account_locked, AccountLocked);
ctor!(captcha_wrong, CaptchaWrong);
ctor!(captcha_expired, CaptchaExpired);
ctor!(user_not_found, UserNotFound);
ctor!(user_already_exists, UserAlreadyExists);
ctor!(mobile_taken, MobileTaken);
ctor!(user_disabled, UserDisabled);
ctor!(permission_denied, PermissionDenied);
ctor!(admin_required, AdminRequired);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg, field_errors) = match self {
            AppError::Tagged(code, msg) => (code, msg, None),
            AppError::Validation(errs) => (
                ErrorCode::InvalidArgument,
                "validation failed".to_string(),
                Some(errs),
            ),
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal error");
                (ErrorCode::Internal, "internal error".to_string(), None)
            }
        };

        let status = code.http_status();
        let body = ErrorEnvelope {
            code: code.as_u32(),
            msg,
            field_errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Generic underlying errors (pool exhaustion, cache down, database
/// deadlock) are normalised to `ServiceUnavailable`/`Internal` at the
/// repository boundary so callers can treat them uniformly.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::Tagged(ErrorCode::UserNotFound, "not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Tagged(ErrorCode::ServiceUnavailable, "database unavailable".into())
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<bb8::RunError<bb8_redis::redis::RedisError>> for AppError {
    fn from(_err: bb8::RunError<bb8_redis::redis::RedisError>) -> Self {
        AppError::Tagged(ErrorCode::ServiceUnavailable, "cache unavailable".into())
    }
}

impl From<bb8_redis::redis::RedisError> for AppError {
    fn from(_err: bb8_redis::redis::RedisError) -> Self {
        AppError::Tagged(ErrorCode::ServiceUnavailable, "cache unavailable".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_error_preserves_numeric_code() {
        let err = wrong_password("bad credentials");
        assert_eq!(err.code().as_u32(), 1006);
    }

    #[test]
    fn validation_errors_map_to_invalid_argument() {
        let err = AppError::Validation(vec![FieldError {
            field: "mobile".into(),
            msg: "must be 11 digits".into(),
        }]);
        assert_eq!(err.code().as_u32(), 200 + 0);
    }
}
