use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::AppResult;
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::auth::AuthUser;
use finory_shared::types::ApiResponse;

use crate::models::{Company, Membership};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 255, message = "company name must be 1 to 255 characters"))]
    pub name: String,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCompany {
    pub company: Company,
    pub membership: Membership,
}

pub async fn list_companies(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Company>>>> {
    let companies = state.companies.companies_for(user.id).await?;
    Ok(Json(ApiResponse::ok(companies)))
}

pub async fn create_company(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateCompanyRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedCompany>>)> {
    let (company, membership) = state
        .companies
        .create_company(user.id, &req.name, req.settings)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreatedCompany { company, membership })),
    ))
}
