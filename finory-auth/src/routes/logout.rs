use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::AppResult;
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    state.auth.logout(&req.refresh_token).await?;
    Ok(Json(ApiResponse::ok("logged out")))
}
