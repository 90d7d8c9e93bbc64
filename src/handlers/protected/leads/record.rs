use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::utils::{fetch_visible_lead, mirror};
use crate::crm::{CrmTask, LeadUpdateInput, TaskFilter};
use crate::database::models::user::validate_email_format;
use crate::error::ApiError;
use crate::leads::LeadView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

/// GET /api/leads/:id - Live lead from the CRM, reshaped for the dashboard
pub async fn lead_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<LeadView> {
    let api = state.crm_for(&current.company)?;
    let lead = fetch_visible_lead(api.as_ref(), &current, &id).await?;
    mirror(&state, &current, &lead).await;
    Ok(ApiResponse::success(LeadView::from(&lead)))
}

/// PATCH /api/leads/:id - Update lead fields in the CRM
///
/// Expected Input (all fields optional, at least one required):
/// ```json
/// { "status": "appointment_set", "appointmentAt": "2025-03-10T15:00:00Z" }
/// ```
pub async fn lead_patch(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(input): Json<LeadUpdateInput>,
) -> ApiResult<LeadView> {
    current.require_lead_editor()?;
    validate_update(&input)?;

    let api = state.crm_for(&current.company)?;
    fetch_visible_lead(api.as_ref(), &current, &id).await?;

    let updated = api.update_lead(&id, &input).await?;
    mirror(&state, &current, &updated).await;

    tracing::info!(lead_id = %id, user_id = %current.user.id, "Lead updated in CRM");
    Ok(ApiResponse::success(LeadView::from(&updated)))
}

/// GET /api/leads/:id/tasks - CRM tasks attached to one lead
pub async fn lead_tasks_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CrmTask>> {
    let api = state.crm_for(&current.company)?;
    fetch_visible_lead(api.as_ref(), &current, &id).await?;

    let filter = TaskFilter {
        lead_id: Some(id),
        ..Default::default()
    };
    let tasks = api.list_tasks(&filter, state.config.crm.page_size).await?;
    Ok(ApiResponse::success(tasks))
}

fn validate_update(input: &LeadUpdateInput) -> Result<(), ApiError> {
    if input.is_empty() {
        return Err(ApiError::bad_request("No lead fields to update"));
    }
    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email_format(email).map_err(|msg| ApiError::field_error("email", msg))?;
    }
    if input.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(ApiError::field_error("status", "Status cannot be empty"));
    }
    Ok(())
}
