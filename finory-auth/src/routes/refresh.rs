use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::AppResult;
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::auth::TokenPair;
use finory_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let pair = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(ApiResponse::ok(pair)))
}
