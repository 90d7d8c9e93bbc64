use serde::Serialize;
use uuid::Uuid;

use crate::auth::{encode_token, Claims, Role};
use crate::database::models::{Company, User};
use crate::error::ApiError;
use crate::state::AppState;

/// User information for token responses
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub company: String,
    pub company_id: Uuid,
    pub crm_user_id: Option<String>,
}

impl UserInfo {
    pub fn new(user: &User, company: &Company, role: Role) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role,
            company: company.slug.clone(),
            company_id: company.id,
            crm_user_id: user.crm_user_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserInfo,
    pub expires_in: i64,
}

/// Sign a fresh session token for an authenticated user
pub fn issue_token(
    state: &AppState,
    user: &User,
    company: &Company,
    role: Role,
) -> Result<TokenResponse, ApiError> {
    let claims = Claims::new(
        user.id,
        company.id,
        company.slug.clone(),
        user.email.clone(),
        role,
        state.config.security.jwt_expiry_hours,
    );
    let token = encode_token(&claims, &state.config.security.jwt_secret)?;

    Ok(TokenResponse {
        token,
        user: UserInfo::new(user, company, role),
        expires_in: claims.expires_in(),
    })
}

/// The one answer every failed credential check gets
pub fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password")
}
