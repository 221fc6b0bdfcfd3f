use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use validator::Validate;

use finory_shared::errors::AppResult;
use finory_shared::middleware::ValidatedJson;
use finory_shared::types::ApiResponse;

use crate::services::auth_service::{RegisterInput, RegisterOutcome};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(max = 255, message = "full name is too long"))]
    pub full_name: Option<String>,
    #[validate(length(max = 255, message = "company name is too long"))]
    pub company_name: Option<String>,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisterOutcome>>)> {
    let outcome = state
        .auth
        .register(RegisterInput {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            company_name: req.company_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            outcome,
            "Registration successful. Please verify your email.",
        )),
    ))
}
