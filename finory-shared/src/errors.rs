use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Authentication and one-time code errors
/// - E2xxx: Tenancy errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,

    // Auth (E1xxx)
    InvalidCredentials,
    DuplicateAccount,
    AccountInactive,
    VerificationRequired,
    SecondFactorRequired,
    InvalidSecondFactorCode,
    InvalidOrExpiredCode,
    AlreadyEnabled,
    SetupRequired,
    TokenExpired,
    TokenInvalid,
    RefreshTokenRevoked,
    PasswordTooWeak,
    EmailRateLimited,

    // Tenancy (E2xxx)
    TenantRequired,
    MembershipNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::DuplicateAccount => "E1002",
            Self::AccountInactive => "E1003",
            Self::VerificationRequired => "E1004",
            Self::SecondFactorRequired => "E1005",
            Self::InvalidSecondFactorCode => "E1006",
            Self::InvalidOrExpiredCode => "E1007",
            Self::AlreadyEnabled => "E1008",
            Self::SetupRequired => "E1009",
            Self::TokenExpired => "E1010",
            Self::TokenInvalid => "E1011",
            Self::RefreshTokenRevoked => "E1012",
            Self::PasswordTooWeak => "E1013",
            Self::EmailRateLimited => "E1014",

            // Tenancy
            Self::TenantRequired => "E2001",
            Self::MembershipNotFound => "E2002",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::PasswordTooWeak
            | Self::InvalidOrExpiredCode | Self::AlreadyEnabled | Self::SetupRequired
            | Self::TenantRequired => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::MembershipNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid | Self::RefreshTokenRevoked | Self::VerificationRequired
            | Self::InvalidSecondFactorCode => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountInactive => StatusCode::FORBIDDEN,
            Self::EmailRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::DuplicateAccount => StatusCode::CONFLICT,
            // Clients key off `requires_2fa` in the body, not the status.
            Self::SecondFactorRequired => StatusCode::OK,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Internal(_) | AppError::Database(_) => ErrorCode::InternalError,
        }
    }
}

/// Generic message for infrastructure failures; the detail is only exposed in debug builds.
fn internal_message(generic: &str, detail: &dyn std::fmt::Display) -> String {
    if cfg!(debug_assertions) {
        format!("{generic}: {detail}")
    } else {
        generic.to_string()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", internal_message("internal server error", err)),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", internal_message("database error", err)),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
