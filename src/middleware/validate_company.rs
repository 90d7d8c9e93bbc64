use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::database::models::Company;
use crate::error::ApiError;
use crate::state::AppState;

/// Company loaded for the authenticated request
#[derive(Clone, Debug)]
pub struct ValidatedCompany(pub Company);

/// Ensures the company named in the token still exists and is active
pub async fn validate_company_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before company validation"))?
        .clone();

    let company = Company::find_by_id(state.pool(), auth_user.company_id)
        .await?
        .filter(|c| c.is_active && c.slug == auth_user.company)
        .ok_or_else(|| {
            tracing::warn!(
                company = %auth_user.company,
                company_id = %auth_user.company_id,
                "Company validation failed: not found or inactive"
            );
            ApiError::forbidden(format!(
                "Company '{}' is not active or does not exist",
                auth_user.company
            ))
        })?;

    tracing::debug!("Company validation successful: {}", company.slug);
    request.extensions_mut().insert(ValidatedCompany(company));

    Ok(next.run(request).await)
}
