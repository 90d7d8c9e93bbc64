use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use super::utils::{invalid_credentials, issue_token, TokenResponse};
use crate::auth::{dummy_password_hash, verify_password};
use crate::database::models::{Company, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login/:company - Authenticate user and receive JWT token
///
/// Expected Input:
/// ```json
/// { "email": "rep@acme.test", "password": "..." }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "id": "...", "email": "...", "role": "sales_rep", "company": "acme" },
///     "expires_in": 86400
///   }
/// }
/// ```
///
/// Unknown company, unknown or inactive user and a wrong password all answer
/// with the same 401.
pub async fn login(
    State(state): State<AppState>,
    Path(company_slug): Path<String>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let pool = state.pool();
    let company = Company::find_by_slug(pool, &company_slug)
        .await?
        .filter(|c| c.is_active);
    let user = match &company {
        Some(company) => User::find_by_email(pool, company.id, &payload.email)
            .await?
            .filter(|u| u.is_active),
        None => None,
    };

    // Misses still pay for a bcrypt verification so timing does not reveal which accounts exist.
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => dummy_password_hash(state.config.security.bcrypt_cost).to_string(),
    };
    let password = payload.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("Password verification task failed: {}", e);
            ApiError::internal_server_error("Authentication failed")
        })?;

    let Some(company) = company else {
        tracing::info!(company = %company_slug, "Login rejected: unknown or inactive company");
        return Err(invalid_credentials());
    };
    let Some(user) = user else {
        tracing::info!(company = %company.slug, "Login rejected: unknown or inactive user");
        return Err(invalid_credentials());
    };
    if !matches {
        tracing::info!(company = %company.slug, user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let role = user.role().ok_or_else(|| {
        tracing::error!(user_id = %user.id, role = %user.role, "User has an unknown role");
        invalid_credentials()
    })?;

    if let Err(e) = User::touch_last_login(pool, user.id).await {
        tracing::warn!(user_id = %user.id, "Could not record last login: {}", e);
    }

    tracing::info!(company = %company.slug, user_id = %user.id, role = %role, "Login succeeded");
    Ok(ApiResponse::success(issue_token(&state, &user, &company, role)?))
}
