use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use super::utils::fetch_visible_lead;
use crate::crm::CrmNote;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

const MAX_NOTE_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub body: String,
}

/// POST /api/leads/:id/notes - Add a note to a lead; open to every role
pub async fn notes_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<NoteRequest>,
) -> ApiResult<CrmNote> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(ApiError::field_error("body", "Note cannot be empty"));
    }
    if body.chars().count() > MAX_NOTE_CHARS {
        return Err(ApiError::field_error(
            "body",
            format!("Note cannot exceed {MAX_NOTE_CHARS} characters"),
        ));
    }

    let api = state.crm_for(&current.company)?;
    fetch_visible_lead(api.as_ref(), &current, &id).await?;

    let note = api.add_note(&id, body).await?;
    tracing::info!(lead_id = %id, user_id = %current.user.id, "Note added to lead");
    Ok(ApiResponse::created(note))
}
