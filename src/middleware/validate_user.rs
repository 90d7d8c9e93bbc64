use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use super::validate_company::ValidatedCompany;
use crate::auth::Role;
use crate::database::models::{Company, User};
use crate::error::ApiError;
use crate::leads::LeadScope;
use crate::state::AppState;

/// Fully validated caller: their user row, company, role and lead scope
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub company: Company,
    pub role: Role,
    pub scope: LeadScope,
}

impl CurrentUser {
    pub fn new(user: User, company: Company, role: Role) -> Self {
        let scope = LeadScope::for_user(role, user.crm_user_id.as_deref());
        Self {
            user,
            company,
            role,
            scope,
        }
    }

    pub fn require_office(&self) -> Result<(), ApiError> {
        if self.role.is_office() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Office manager access required"))
        }
    }

    pub fn require_lead_editor(&self) -> Result<(), ApiError> {
        if self.role.can_edit_leads() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Role '{}' cannot edit leads", self.role)))
        }
    }
}

/// Ensures the token's user exists, is active, belongs to the company and
/// still holds the role the token was issued for
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?
        .clone();

    let ValidatedCompany(company) = request
        .extensions()
        .get::<ValidatedCompany>()
        .ok_or_else(|| ApiError::internal_server_error("Company required before user validation"))?
        .clone();

    let user = User::find_by_id(state.pool(), auth_user.user_id)
        .await?
        .filter(|u| u.is_active && u.company_id == company.id)
        .ok_or_else(|| {
            tracing::warn!(
                user_id = %auth_user.user_id,
                company = %company.slug,
                "User validation failed: not found or inactive"
            );
            ApiError::forbidden(format!("User '{}' is not active in company '{}'", auth_user.email, company.slug))
        })?;

    match user.role() {
        Some(role) if role == auth_user.role => {
            tracing::debug!("User validation successful: {} as {}", user.email, role);
            request.extensions_mut().insert(CurrentUser::new(user, company, role));
            Ok(next.run(request).await)
        }
        db_role => {
            tracing::warn!(
                "User validation failed: token role '{}' doesn't match database role {:?}",
                auth_user.role,
                db_role
            );
            Err(ApiError::forbidden("User role mismatch"))
        }
    }
}
