use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use finory_shared::clients::db::with_conn;
use finory_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// Liveness plus a probe of each backing service that is configured.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::new();

    if let Some(pool) = &state.db {
        let probe = with_conn(pool, |conn| {
            use diesel::RunQueryDsl;
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await;
        checks.push(match probe {
            Ok(()) => HealthCheck { name: "postgres".into(), status: HealthStatus::Healthy, message: None },
            Err(e) => HealthCheck {
                name: "postgres".into(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            },
        });
    }

    if let Some(redis) = &state.redis {
        // Redis only memoizes; losing it degrades but does not stop the service.
        checks.push(match redis.ping().await {
            Ok(()) => HealthCheck { name: "redis".into(), status: HealthStatus::Healthy, message: None },
            Err(e) => HealthCheck {
                name: "redis".into(),
                status: HealthStatus::Degraded,
                message: Some(e.to_string()),
            },
        });
    }

    let response = HealthResponse::healthy("finory-auth", env!("CARGO_PKG_VERSION")).with_checks(checks);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
