use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::middleware::OptionalAuthUser;
use crate::tenancy::{TenantContext, TenantResolver};
use crate::types::auth::AuthState;

/// Service state that can resolve the tenant of a request.
pub trait TenantState: AuthState {
    fn tenant_resolver(&self) -> &TenantResolver;
}

/// The tenant the request acts under. `None` for anonymous requests and for
/// accounts without an active membership; tenant-scoped collections must then
/// answer with an empty list rather than an error.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Option<TenantContext>);

#[axum::async_trait]
impl<S> FromRequestParts<Arc<S>> for CurrentTenant
where
    S: TenantState,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<CurrentTenant>() {
            return Ok(resolved.clone());
        }

        let OptionalAuthUser(user) = OptionalAuthUser::from_request_parts(parts, state).await?;
        let tenant = state
            .tenant_resolver()
            .resolve(user.map(|u| u.id))
            .await?;

        let current = CurrentTenant(tenant);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}
