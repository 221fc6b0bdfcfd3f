use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use uuid::Uuid;

use crate::errors::AppResult;

use super::{ResolutionCache, TenantContext};

/// Read access to the membership table.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// First active membership of the account, by membership creation order.
    async fn first_active_membership(&self, account_id: Uuid) -> AppResult<Option<TenantContext>>;
}

pub struct TenantResolver {
    memberships: Arc<dyn MembershipSource>,
    cache: Arc<dyn ResolutionCache>,
    ttl: Duration,
}

impl TenantResolver {
    pub fn new(memberships: Arc<dyn MembershipSource>, cache: Arc<dyn ResolutionCache>, ttl: Duration) -> Self {
        Self { memberships, cache, ttl }
    }

    pub async fn resolve(&self, account_id: Option<Uuid>) -> AppResult<Option<TenantContext>> {
        let Some(account_id) = account_id else {
            return Ok(None);
        };

        match self.cache.get(account_id).await {
            Ok(Some(cached)) => return Ok(Some(cached)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, account_id = %account_id, "tenant cache read failed");
            }
        }

        let Some(resolved) = self.memberships.first_active_membership(account_id).await? else {
            tracing::debug!(account_id = %account_id, "no active membership");
            return Ok(None);
        };

        if let Err(e) = self.cache.put(account_id, &resolved, self.ttl).await {
            tracing::warn!(error = %e, account_id = %account_id, "tenant cache write failed");
        }

        tracing::debug!(
            account_id = %account_id,
            tenant_id = %resolved.tenant_id,
            "tenant resolved"
        );

        Ok(Some(resolved))
    }

    /// Drop the memoized answer so the next request re-reads memberships.
    pub async fn invalidate(&self, account_id: Uuid) {
        if let Err(e) = self.cache.invalidate(account_id).await {
            tracing::warn!(error = %e, account_id = %account_id, "tenant cache invalidation failed");
        }
    }
}
