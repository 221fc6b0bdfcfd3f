use std::sync::Arc;
use std::time::Duration;

use finory_auth::config::{AppConfig, TenantCacheBackend};
use finory_auth::services::two_factor::TotpSettings;
use finory_auth::services::{AuthService, AuthSettings, CompanyService};
use finory_auth::store::PgStore;
use finory_auth::AppState;
use finory_shared::clients::db::create_pool;
use finory_shared::clients::email::EmailClient;
use finory_shared::clients::redis::RedisClient;
use finory_shared::tenancy::{InMemoryResolutionCache, RedisResolutionCache, ResolutionCache, TenantResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    finory_shared::middleware::init_tracing("finory-auth");

    let config = AppConfig::load()?;
    let port = config.port;
    let metrics_handle = finory_shared::middleware::init_metrics()?;

    let db = create_pool(&config.database_url, config.database_pool_size)?;
    let store = Arc::new(PgStore::new(db.clone()));

    let redis = match RedisClient::connect(&config.redis_url).await {
        Ok(redis) => Some(redis),
        Err(e) if config.tenant_cache == TenantCacheBackend::Memory => {
            tracing::warn!(error = %e, "redis unavailable, code rate limiting disabled");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let cache: Arc<dyn ResolutionCache> = match (config.tenant_cache, &redis) {
        (TenantCacheBackend::Redis, Some(redis)) => Arc::new(RedisResolutionCache::new(redis.clone())),
        _ => Arc::new(InMemoryResolutionCache::new()),
    };
    let tenant_resolver = Arc::new(TenantResolver::new(
        store.clone(),
        cache,
        Duration::from_secs(config.tenant_cache_ttl),
    ));

    let email = Arc::new(EmailClient::new(&config.resend_api_key, &config.from_email, "Finory IA"));
    let auth = AuthService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        email,
        AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            access_ttl: config.jwt_access_ttl,
            refresh_ttl: config.jwt_refresh_ttl,
            totp: TotpSettings {
                issuer: config.totp_issuer.clone(),
                skew: config.totp_skew,
            },
            expose_debug_codes: config.expose_debug_codes,
        },
    );
    let companies = CompanyService::new(store, tenant_resolver.clone());

    if config.expose_debug_codes {
        tracing::warn!("one-time codes are echoed in responses; never enable this in production");
    }
    tracing::info!(backend = ?config.tenant_cache, ttl_secs = config.tenant_cache_ttl, "tenant resolver ready");

    let state = Arc::new(AppState {
        config,
        auth,
        companies,
        tenant_resolver,
        db: Some(db),
        redis,
        metrics_handle: Some(metrics_handle),
    });

    let app = finory_auth::app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "finory-auth starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
