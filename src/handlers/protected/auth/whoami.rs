use axum::Extension;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::public::auth::utils::UserInfo;
use crate::leads::LeadScope;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    #[serde(flatten)]
    pub user: UserInfo,
    pub company_name: String,
    pub lead_scope: &'static str,
    pub can_edit_leads: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

fn scope_label(scope: &LeadScope) -> &'static str {
    match scope {
        LeadScope::Company => "company",
        LeadScope::SalesRep(_) => "sales_rep",
        LeadScope::Canvasser(_) => "canvasser",
        LeadScope::ProjectManager(_) => "project_manager",
        LeadScope::Nothing => "none",
    }
}

/// GET /api/auth/whoami - Current user, company and effective lead scope
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": "user_uuid",
///     "email": "rep@acme.test",
///     "role": "sales_rep",
///     "company": "acme",
///     "lead_scope": "sales_rep",
///     "can_edit_leads": true
///   }
/// }
/// ```
pub async fn whoami(Extension(current): Extension<CurrentUser>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        user: UserInfo::new(&current.user, &current.company, current.role),
        company_name: current.company.name.clone(),
        lead_scope: scope_label(&current.scope),
        can_edit_leads: current.role.can_edit_leads(),
        last_login_at: current.user.last_login_at,
    }))
}
