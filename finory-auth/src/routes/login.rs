use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::ApiResponse;

use crate::services::auth_service::LoginOutcome;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub two_factor_code: Option<String>,
}

/// A missing second factor answers 200 with `requires_2fa` in the error
/// details; the client retries with `two_factor_code`.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginOutcome>>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "email and password are required"));
    }

    let outcome = state
        .auth
        .login(&req.email, &req.password, req.two_factor_code.as_deref())
        .await?;

    Ok(Json(ApiResponse::ok(outcome)))
}
