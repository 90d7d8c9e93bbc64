use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use super::utils::{issue_token, TokenResponse};
use crate::auth::decode_token;
use crate::database::models::{Company, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

/// POST /auth/refresh - Exchange a (possibly expired) token for a new one
///
/// The signature must verify, the token may be expired by at most the
/// configured refresh window, and the user and company must still be active.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let security = &state.config.security;
    let claims = decode_token(payload.token.trim(), &security.jwt_secret, true)?;

    if !within_refresh_window(claims.exp, Utc::now().timestamp(), security.jwt_refresh_window_days) {
        return Err(ApiError::unauthorized("Token is too old to refresh, please log in again"));
    }

    let pool = state.pool();
    let company = Company::find_by_id(pool, claims.company_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::unauthorized("Company is not active"))?;
    let user = User::find_by_id(pool, claims.sub)
        .await?
        .filter(|u| u.is_active && u.company_id == company.id)
        .ok_or_else(|| ApiError::unauthorized("User is not active"))?;

    // Role comes from the database so demotions take effect on refresh.
    let role = user
        .role()
        .ok_or_else(|| ApiError::unauthorized("User role is not recognised"))?;

    Ok(ApiResponse::success(issue_token(&state, &user, &company, role)?))
}

fn within_refresh_window(exp: i64, now: i64, window_days: i64) -> bool {
    now <= exp + window_days.max(0) * 86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_window_is_measured_from_expiry() {
        let exp = 1_000_000;
        assert!(within_refresh_window(exp, exp - 10, 7));
        assert!(within_refresh_window(exp, exp + 7 * 86_400, 7));
        assert!(!within_refresh_window(exp, exp + 7 * 86_400 + 1, 7));
        assert!(!within_refresh_window(exp, exp + 1, 0));
    }
}
