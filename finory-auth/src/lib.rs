use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::AppConfig;
use finory_shared::clients::db::DbPool;
use finory_shared::clients::redis::RedisClient;
use finory_shared::middleware::{metrics_middleware, TenantState};
use finory_shared::tenancy::TenantResolver;
use finory_shared::types::auth::AuthState;
use services::{AuthService, CompanyService};

pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthService,
    pub companies: CompanyService,
    pub tenant_resolver: Arc<TenantResolver>,
    /// Probed by the health check; absent in tests.
    pub db: Option<DbPool>,
    /// Rate limiting is skipped without Redis.
    pub redis: Option<RedisClient>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AuthState for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

impl TenantState for AppState {
    fn tenant_resolver(&self) -> &TenantResolver {
        &self.tenant_resolver
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/register", post(routes::register::register))
        .route("/login", post(routes::login::login))
        .route("/verify-email", post(routes::verify_email::verify_email))
        .route("/resend-otp", post(routes::resend_otp::resend_otp))
        .route("/forgot-password", post(routes::forgot_password::forgot_password))
        .route("/reset-password", post(routes::reset_password::reset_password))
        .route("/refresh", post(routes::refresh::refresh_token))
        .route("/logout", post(routes::logout::logout))
        .route("/me", get(routes::me::me))
        .route("/2fa/setup", post(routes::two_factor::setup))
        .route("/2fa/enable", post(routes::two_factor::enable))
        .route("/2fa/verify", post(routes::two_factor::verify))
        .route(
            "/companies",
            get(routes::companies::list_companies).post(routes::companies::create_company),
        )
        .route("/tenant", get(routes::tenant::current_tenant))
        .route("/tenant/members", get(routes::tenant::list_members))
        .route("/tenant/members/:user_id", put(routes::tenant::update_member))
        .layer(from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::services::auth_service::tests::{service_with, RecordingDelivery};
    use crate::services::two_factor;
    use crate::store::memory::MemoryStore;
    use finory_shared::tenancy::InMemoryResolutionCache;

    struct TestApp {
        store: Arc<MemoryStore>,
        router: Router,
    }

    fn test_app(expose_debug_codes: bool) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(TenantResolver::new(
            store.clone(),
            Arc::new(InMemoryResolutionCache::new()),
            Duration::from_secs(3600),
        ));
        let config = AppConfig {
            jwt_secret: "test-secret".into(),
            expose_debug_codes,
            ..AppConfig::default()
        };
        let state = Arc::new(AppState {
            auth: service_with(store.clone(), Arc::new(RecordingDelivery::default()), expose_debug_codes),
            companies: CompanyService::new(store.clone(), resolver.clone()),
            tenant_resolver: resolver,
            config,
            db: None,
            redis: None,
            metrics_handle: None,
        });
        TestApp { store, router: app(state) }
    }

    async fn call(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    /// Registers, verifies with the echoed code and logs in; returns the access token.
    async fn onboard(app: &TestApp, email: &str, company: Option<&str>) -> String {
        let (status, body) = call(
            &app.router,
            "POST",
            "/register",
            None,
            Some(json!({ "email": email, "password": "correct-horse-9", "company_name": company })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let code = body["data"]["otp_debug"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app.router,
            "POST",
            "/verify-email",
            None,
            Some(json!({ "email": email, "otp_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app.router,
            "POST",
            "/login",
            None,
            Some(json!({ "email": email, "password": "correct-horse-9" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["tokens"]["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_without_backends_is_healthy() {
        let app = test_app(false);
        let (status, body) = call(&app.router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "finory-auth");
    }

    #[tokio::test]
    async fn register_hides_codes_unless_debugging() {
        let app = test_app(false);
        let (status, body) = call(
            &app.router,
            "POST",
            "/register",
            None,
            Some(json!({ "email": "ana@finory.io", "password": "correct-horse-9" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["data"].get("otp_debug").is_none());
        assert!(body["data"]["user"].get("password_hash").is_none());
        assert!(body["data"]["user"].get("otp_code").is_none());
        assert!(body["meta"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn invalid_email_is_a_validation_error() {
        let app = test_app(false);
        let (status, body) = call(
            &app.router,
            "POST",
            "/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "correct-horse-9" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0002");
    }

    #[tokio::test]
    async fn missing_login_field_is_a_validation_error() {
        let app = test_app(false);
        let (status, body) = call(&app.router, "POST", "/login", None, Some(json!({ "email": "a@x.com" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0002");
        assert!(body["meta"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_validation_error() {
        let app = test_app(false);
        let request = Request::builder()
            .method("POST")
            .uri("/refresh")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"refresh_token\": "))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "E0002");
    }

    #[tokio::test]
    async fn unverified_login_is_refused_with_flag() {
        let app = test_app(true);
        call(
            &app.router,
            "POST",
            "/register",
            None,
            Some(json!({ "email": "ana@finory.io", "password": "correct-horse-9" })),
        )
        .await;

        let (status, body) = call(
            &app.router,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ana@finory.io", "password": "correct-horse-9" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "E1004");
        assert_eq!(body["error"]["details"]["requires_verification"], true);
    }

    #[tokio::test]
    async fn forgot_password_message_is_uniform() {
        let app = test_app(false);
        onboard(&app, "ana@finory.io", None).await;

        let (_, known) = call(&app.router, "POST", "/forgot-password", None, Some(json!({ "email": "ana@finory.io" }))).await;
        let (_, unknown) = call(&app.router, "POST", "/forgot-password", None, Some(json!({ "email": "ghost@finory.io" }))).await;
        assert_eq!(known["success"], true);
        assert_eq!(known["message"], unknown["message"]);
        assert_eq!(known["message"], "If an account exists with this email, a reset code has been sent.");
    }

    #[tokio::test]
    async fn second_factor_required_is_a_soft_200() {
        let app = test_app(true);
        let token = onboard(&app, "ana@finory.io", None).await;

        let (_, setup) = call(&app.router, "POST", "/2fa/setup", Some(&token), None).await;
        let secret = setup["data"]["secret"].as_str().unwrap().to_string();
        assert!(setup["data"]["qr_code"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let totp = two_factor::TotpSettings { issuer: "Finory IA".into(), skew: 1 };
        let code = two_factor::code_at(&totp, &secret, chrono::Utc::now().timestamp() as u64);
        let (status, _) = call(&app.router, "POST", "/2fa/enable", Some(&token), Some(json!({ "code": code }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app.router,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ana@finory.io", "password": "correct-horse-9" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E1005");
        assert_eq!(body["error"]["details"]["requires_2fa"], true);

        let (status, body) = call(&app.router, "POST", "/2fa/verify", Some(&token), Some(json!({ "code": code }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verified"], true);
    }

    #[tokio::test]
    async fn me_requires_bearer() {
        let app = test_app(true);
        let (status, body) = call(&app.router, "GET", "/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "E0004");

        let token = onboard(&app, "ana@finory.io", None).await;
        let (status, body) = call(&app.router, "GET", "/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "ana@finory.io");
        assert_eq!(body["data"]["is_email_verified"], true);
    }

    #[tokio::test]
    async fn anonymous_tenant_requests_are_empty_not_errors() {
        let app = test_app(false);
        let (status, body) = call(&app.router, "GET", "/tenant", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());

        let (status, body) = call(&app.router, "GET", "/tenant/members", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
        assert_eq!(app.store.membership_queries(), 0);
    }

    #[tokio::test]
    async fn tenant_resolution_is_cached_per_account() {
        let app = test_app(true);
        let token = onboard(&app, "ana@finory.io", Some("Acme SL")).await;

        let (_, first) = call(&app.router, "GET", "/tenant", Some(&token), None).await;
        let (_, second) = call(&app.router, "GET", "/tenant/members", Some(&token), None).await;
        assert_eq!(first["data"]["tenant_name"], "Acme SL");
        assert_eq!(second["data"].as_array().unwrap().len(), 1);
        assert_eq!(app.store.membership_queries(), 1);
    }

    #[tokio::test]
    async fn member_toggle_flows_through_to_resolution() {
        let app = test_app(true);
        let owner = onboard(&app, "owner@finory.io", Some("Acme SL")).await;
        let member = onboard(&app, "member@finory.io", None).await;

        let (_, tenant) = call(&app.router, "GET", "/tenant", Some(&owner), None).await;
        let company_id: uuid::Uuid = serde_json::from_value(tenant["data"]["tenant_id"].clone()).unwrap();
        let (_, me) = call(&app.router, "GET", "/me", Some(&member), None).await;
        let member_id: uuid::Uuid = serde_json::from_value(me["data"]["id"].clone()).unwrap();
        app.store.add_membership(company_id, member_id, false);

        let (_, before) = call(&app.router, "GET", "/tenant", Some(&member), None).await;
        assert!(before["data"].is_null());

        let (status, body) = call(
            &app.router,
            "PUT",
            &format!("/tenant/members/{member_id}"),
            Some(&owner),
            Some(json!({ "is_active": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, after) = call(&app.router, "GET", "/tenant", Some(&member), None).await;
        assert_eq!(after["data"]["tenant_id"], json!(company_id));

        let (status, body) = call(
            &app.router,
            "PUT",
            &format!("/tenant/members/{}", uuid::Uuid::new_v4()),
            Some(&owner),
            Some(json!({ "is_active": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "E2002");
    }

    #[tokio::test]
    async fn companies_create_and_list() {
        let app = test_app(true);
        let token = onboard(&app, "ana@finory.io", None).await;

        let (status, body) = call(
            &app.router,
            "POST",
            "/companies",
            Some(&token),
            Some(json!({ "name": "Acme SL", "settings": { "currency": "EUR" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["company"]["settings"]["currency"], "EUR");

        let (_, listed) = call(&app.router, "GET", "/companies", Some(&token), None).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);

        let (_, tenant) = call(&app.router, "GET", "/tenant", Some(&token), None).await;
        assert_eq!(tenant["data"]["tenant_name"], "Acme SL");
    }

    #[tokio::test]
    async fn refresh_token_cannot_be_replayed() {
        let app = test_app(true);
        onboard(&app, "ana@finory.io", None).await;
        let (_, login) = call(
            &app.router,
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ana@finory.io", "password": "correct-horse-9" })),
        )
        .await;
        let refresh = login["data"]["tokens"]["refresh_token"].as_str().unwrap().to_string();

        let (status, _) = call(&app.router, "POST", "/refresh", None, Some(json!({ "refresh_token": refresh }))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app.router, "POST", "/refresh", None, Some(json!({ "refresh_token": refresh }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "E1012");
    }
}
