use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::ApiResponse;

use crate::routes::check_code_rate_limit;
use crate::services::auth_service::{normalize_email, CodeIssued};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Same answer whether or not the account exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<CodeIssued>>> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "email is required"));
    }
    check_code_rate_limit(&state, "reset", &email).await?;

    let issued = state.auth.forgot_password(&email).await?;

    Ok(Json(ApiResponse::ok_with_message(
        issued,
        "If an account exists with this email, a reset code has been sent.",
    )))
}
