use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Leadboard API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Roofing sales dashboard backend with CRM proxy and delta sync",
            "endpoints": {
                "health": "/health (public)",
                "public_auth": "/auth/login/:company, /auth/refresh (public - token acquisition)",
                "webhooks": "/webhooks/crm/:company (public, signed)",
                "auth": "/api/auth/whoami (protected)",
                "leads": "/api/leads[/:id[/notes|/tasks]] (protected)",
                "tasks": "/api/tasks (protected)",
                "calendar": "/api/calendar (protected)",
                "sync": "/api/sync, /api/sync/status (protected, office manager)",
                "company": "/api/company/* (protected, office manager)",
                "users": "/api/users (protected, office manager)",
            }
        }
    }))
}

/// GET /health - Database ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
