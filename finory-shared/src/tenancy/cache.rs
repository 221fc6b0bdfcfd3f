use std::time::{Duration, Instant};

use axum::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::clients::redis::RedisClient;
use crate::errors::{AppError, AppResult};

use super::TenantContext;

/// Keyed store with per-entry expiry, shared by all request workers.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    async fn get(&self, account_id: Uuid) -> AppResult<Option<TenantContext>>;
    async fn put(&self, account_id: Uuid, ctx: &TenantContext, ttl: Duration) -> AppResult<()>;
    async fn invalidate(&self, account_id: Uuid) -> AppResult<()>;
}

fn cache_key(account_id: Uuid) -> String {
    format!("tenant:resolution:{account_id}")
}

/// Redis-backed cache, shared across processes.
pub struct RedisResolutionCache {
    redis: RedisClient,
}

impl RedisResolutionCache {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ResolutionCache for RedisResolutionCache {
    async fn get(&self, account_id: Uuid) -> AppResult<Option<TenantContext>> {
        let raw = self
            .redis
            .get(&cache_key(account_id))
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AppError::Internal(e.into())),
            None => Ok(None),
        }
    }

    async fn put(&self, account_id: Uuid, ctx: &TenantContext, ttl: Duration) -> AppResult<()> {
        let json = serde_json::to_string(ctx).map_err(|e| AppError::Internal(e.into()))?;
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        self.redis
            .set(&cache_key(account_id), &json, ttl_secs)
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }

    async fn invalidate(&self, account_id: Uuid) -> AppResult<()> {
        self.redis
            .del(&cache_key(account_id))
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }
}

/// Process-local cache for single-instance deployments and tests.
#[derive(Default)]
pub struct InMemoryResolutionCache {
    entries: DashMap<Uuid, (TenantContext, Instant)>,
}

impl InMemoryResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResolutionCache for InMemoryResolutionCache {
    async fn get(&self, account_id: Uuid) -> AppResult<Option<TenantContext>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(&account_id)
            .and_then(|entry| (entry.1 > now).then(|| entry.0.clone()));

        if hit.is_none() {
            self.entries.remove_if(&account_id, |_, (_, deadline)| *deadline <= now);
        }
        Ok(hit)
    }

    async fn put(&self, account_id: Uuid, ctx: &TenantContext, ttl: Duration) -> AppResult<()> {
        self.entries.insert(account_id, (ctx.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate(&self, account_id: Uuid) -> AppResult<()> {
        self.entries.remove(&account_id);
        Ok(())
    }
}
