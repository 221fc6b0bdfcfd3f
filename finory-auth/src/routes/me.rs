use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use finory_shared::errors::AppResult;
use finory_shared::types::auth::AuthUser;
use finory_shared::types::ApiResponse;

use crate::models::Account;
use crate::AppState;

pub async fn me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let account = state.auth.me(user.id).await?;
    Ok(Json(ApiResponse::ok(account)))
}
