use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp_code: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    if req.email.trim().is_empty() || req.otp_code.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "email and otp_code are required"));
    }

    state
        .auth
        .reset_password(&req.email, &req.otp_code, &req.new_password)
        .await?;

    Ok(Json(ApiResponse::ok("password reset successful")))
}
