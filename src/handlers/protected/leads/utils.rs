use crate::crm::{CrmApi, CrmError, CrmLead};
use crate::database::models::{Lead, LeadRecord};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Fetch a lead from the CRM and hide it unless the caller's scope covers it
pub async fn fetch_visible_lead(
    api: &dyn CrmApi,
    current: &CurrentUser,
    id: &str,
) -> Result<CrmLead, ApiError> {
    let lead = api.get_lead(id).await?;
    let record = LeadRecord::from_crm(current.company.id, &lead);
    if !record.visible_to(&current.scope) {
        tracing::debug!(lead_id = %id, user_id = %current.user.id, "Lead outside caller scope");
        return Err(CrmError::NotFound(id.to_string()).into());
    }
    Ok(lead)
}

/// Refresh the local mirror from a lead the CRM just returned
pub async fn mirror(state: &AppState, current: &CurrentUser, lead: &CrmLead) {
    let record = LeadRecord::from_crm(current.company.id, lead);
    if let Err(e) = Lead::upsert(state.pool(), &record).await {
        tracing::warn!(lead_id = %lead.id, "Could not mirror lead locally: {}", e);
    }
}
