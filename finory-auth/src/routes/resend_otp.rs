use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use finory_shared::errors::AppResult;
use finory_shared::middleware::OptionalAuthUser;
use finory_shared::types::ApiResponse;

use crate::routes::{check_code_rate_limit, identity_from, rate_limit_subject};
use crate::services::auth_service::CodeIssued;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ResendOtpRequest {
    pub email: Option<String>,
}

pub async fn resend_otp(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    body: Option<Json<ResendOtpRequest>>,
) -> AppResult<Json<ApiResponse<CodeIssued>>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let identity = identity_from(user, req.email.as_deref())?;
    check_code_rate_limit(&state, "verify", &rate_limit_subject(&identity)).await?;

    let issued = state.auth.resend_verification_code(identity).await?;

    Ok(Json(ApiResponse::ok_with_message(
        issued,
        "If the account exists and is not yet verified, a new code has been sent.",
    )))
}
