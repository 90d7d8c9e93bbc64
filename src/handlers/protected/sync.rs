use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::SyncRun;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;
use crate::sync::SyncReport;

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub interval_secs: i32,
    pub has_crm_credential: bool,
    pub running: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub watermark: Option<DateTime<Utc>>,
    pub last_run: Option<SyncRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub full: bool,
}

/// GET /api/sync/status - Watermark and most recent run for the company
pub async fn sync_status_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<SyncStatus> {
    current.require_office()?;
    let company = &current.company;
    let last_run = SyncRun::latest_for_company(state.pool(), company.id).await?;

    Ok(ApiResponse::success(SyncStatus {
        enabled: company.sync_enabled,
        interval_secs: company.sync_interval_secs,
        has_crm_credential: company.has_crm_credential(),
        running: state.sync.is_running(company.id),
        last_synced_at: company.last_synced_at,
        watermark: company.sync_watermark,
        last_run,
    }))
}

/// POST /api/sync?full=true|false - Run a delta sync now
///
/// `full=true` ignores the watermark and prunes leads the CRM no longer has.
/// Answers 409 when a sync for the company is already in flight.
pub async fn sync_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<SyncParams>,
) -> ApiResult<SyncReport> {
    current.require_office()?;
    tracing::info!(
        company = %current.company.slug,
        user_id = %current.user.id,
        full = params.full,
        "On-demand sync requested"
    );
    let report = state.sync.sync_company(current.company.id, params.full).await?;
    Ok(ApiResponse::success(report))
}
