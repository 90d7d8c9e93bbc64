pub mod auth;
pub mod cli;
pub mod config;
pub mod crm;
pub mod crypto;
pub mod database;
pub mod error;
pub mod handlers;
pub mod leads;
pub mod middleware;
pub mod state;
pub mod sync;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::handlers::{protected, public, system};
use crate::middleware::{jwt_auth_middleware, validate_company_middleware, validate_user_middleware};
pub use crate::state::AppState;

/// Full HTTP surface: public routes plus `/api` behind JWT, company and user validation
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(public_routes())
        .nest("/api", protected_routes(state.clone()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::{auth, webhooks};

    Router::new()
        .route("/auth/login/:company", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/webhooks/crm/:company", post(webhooks::crm_webhook))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, calendar, company, leads, sync, tasks, users};

    Router::new()
        .route("/auth/whoami", get(auth::whoami))
        .route("/leads", get(leads::leads_get))
        .route("/leads/:id", get(leads::lead_get).patch(leads::lead_patch))
        .route("/leads/:id/notes", post(leads::notes_post))
        .route("/leads/:id/tasks", get(leads::lead_tasks_get))
        .route("/tasks", get(tasks::tasks_get))
        .route("/calendar", get(calendar::calendar_get))
        .route("/sync", post(sync::sync_post))
        .route("/sync/status", get(sync::sync_status_get))
        .route(
            "/company/settings",
            get(company::settings_get).put(company::settings_put),
        )
        .route("/company/crm-credential", put(company::crm_credential_put))
        .route("/company/crm-credential/test", post(company::crm_credential_test))
        .route("/company/webhook-secret", post(company::webhook_secret_post))
        .route("/users", get(users::users_get).post(users::users_post))
        // Layers run bottom-up: JWT, then company, then user.
        .layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .layer(from_fn_with_state(state.clone(), validate_company_middleware))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::crm::HttpCrmConnector;
    use crate::crypto::CredentialCipher;
    use crate::database::DatabaseManager;

    fn test_app() -> Router {
        let config = AppConfig::development();
        let db = DatabaseManager::connect_lazy(&config.database).unwrap();
        let connector = HttpCrmConnector::new(config.crm.clone()).unwrap();
        let cipher = CredentialCipher::from_key_bytes(&[1u8; 32]).unwrap();
        app(AppState::new(config, db, Arc::new(connector), cipher))
    }

    #[tokio::test]
    async fn api_rejects_missing_bearer_token() {
        let res = test_app()
            .oneshot(Request::get("/api/leads").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let config = AppConfig::development();
        let oversized = "x".repeat(config.api.max_request_size_bytes + 1);
        let res = test_app()
            .oneshot(
                Request::post("/auth/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"token":"{oversized}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
