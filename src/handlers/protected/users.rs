use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::auth::{hash_password, Role};
use crate::database::models::user::validate_email_format;
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
    pub crm_user_id: Option<String>,
}

/// GET /api/users - Every user of the caller's company
pub async fn users_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<User>> {
    current.require_office()?;
    let users = User::list_by_company(state.pool(), current.company.id).await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/users - Create a dashboard user in the caller's company
pub async fn users_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<User> {
    current.require_office()?;

    validate_email_format(&payload.email).map_err(|msg| ApiError::field_error("email", msg))?;
    if payload.full_name.trim().is_empty() {
        return Err(ApiError::field_error("full_name", "Full name cannot be empty"));
    }
    let role: Role = payload
        .role
        .parse()
        .map_err(|e: crate::auth::UnknownRole| ApiError::field_error("role", e.to_string()))?;

    let cost = state.config.security.bcrypt_cost;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            ApiError::internal_server_error("Could not create user")
        })??;

    let new_user = NewUser {
        company_id: current.company.id,
        email: payload.email,
        password_hash,
        full_name: payload.full_name,
        role,
        crm_user_id: payload.crm_user_id.filter(|id| !id.trim().is_empty()),
    };
    let user = User::create(state.pool(), &new_user).await?;

    tracing::info!(
        company = %current.company.slug,
        created_user = %user.id,
        role = %role,
        "User created"
    );
    Ok(ApiResponse::created(user))
}
