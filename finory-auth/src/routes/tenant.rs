use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;
use uuid::Uuid;

use finory_shared::errors::AppResult;
use finory_shared::middleware::{CurrentTenant, ValidatedJson};
use finory_shared::tenancy::TenantContext;
use finory_shared::types::auth::AuthUser;
use finory_shared::types::ApiResponse;

use crate::models::Membership;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMembershipRequest {
    pub is_active: bool,
}

/// The tenant this request acts under, or `null`.
pub async fn current_tenant(
    CurrentTenant(tenant): CurrentTenant,
) -> Json<ApiResponse<Option<TenantContext>>> {
    Json(ApiResponse::ok(tenant))
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
) -> AppResult<Json<ApiResponse<Vec<Membership>>>> {
    let members = state.companies.members(tenant.as_ref()).await?;
    Ok(Json(ApiResponse::ok(members)))
}

/// Activates or deactivates another member of the current tenant.
pub async fn update_member(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateMembershipRequest>,
) -> AppResult<Json<ApiResponse<Membership>>> {
    let membership = state
        .companies
        .set_member_active(tenant.as_ref(), user.id, user_id, req.is_active)
        .await?;
    Ok(Json(ApiResponse::ok(membership)))
}
