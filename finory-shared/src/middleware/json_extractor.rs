use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::{AppError, ErrorCode};

/// JSON body that is deserialized and validated before the handler runs.
/// Malformed bodies, missing fields and failed rules all answer with the
/// `ValidationError` envelope.
pub struct ValidatedJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(ErrorCode::ValidationError, rejection.body_text())
    }
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}
