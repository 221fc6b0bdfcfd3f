use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::auth::AuthUser;
use finory_shared::types::ApiResponse;

use crate::services::two_factor::TwoFactorSetup;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TwoFactorCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorVerified {
    pub verified: bool,
}

fn required(code: &str) -> AppResult<&str> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "code is required"));
    }
    Ok(code)
}

pub async fn setup(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<TwoFactorSetup>>> {
    let setup = state.auth.setup_two_factor(user.id).await?;
    Ok(Json(ApiResponse::ok_with_message(
        setup,
        "Scan the QR code with an authenticator app, then confirm with a code.",
    )))
}

pub async fn enable(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TwoFactorCodeRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    state.auth.enable_two_factor(user.id, required(&req.code)?).await?;
    Ok(Json(ApiResponse::ok("two-factor authentication enabled")))
}

pub async fn verify(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TwoFactorCodeRequest>,
) -> AppResult<Json<ApiResponse<TwoFactorVerified>>> {
    state.auth.verify_two_factor(user.id, required(&req.code)?).await?;
    Ok(Json(ApiResponse::ok(TwoFactorVerified { verified: true })))
}
