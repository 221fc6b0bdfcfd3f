use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::middleware::{OptionalAuthUser, ValidatedJson};
use finory_shared::types::ApiResponse;

use crate::models::Account;
use crate::routes::identity_from;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    pub otp_code: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub user: Account,
}

pub async fn verify_email(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> AppResult<Json<ApiResponse<VerifyEmailResponse>>> {
    if req.otp_code.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "otp_code is required"));
    }
    let identity = identity_from(user, req.email.as_deref())?;

    let user = state.auth.verify_email(identity, &req.otp_code).await?;

    Ok(Json(ApiResponse::ok_with_message(
        VerifyEmailResponse { user },
        "Email verified successfully",
    )))
}
