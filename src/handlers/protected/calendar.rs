use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::Lead;
use crate::leads::{group_by_day, CalendarDay, CalendarEvent, CalendarRange};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<CalendarDay>,
}

/// GET /api/calendar?start=YYYY-MM-DD&end=YYYY-MM-DD - Appointments grouped by day
pub async fn calendar_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<CalendarParams>,
) -> ApiResult<CalendarResponse> {
    let range = CalendarRange::parse(
        params.start.as_deref(),
        params.end.as_deref(),
        Utc::now().date_naive(),
        state.config.api.calendar_max_days,
    )?;
    let (from, to) = range.bounds()?;

    let leads = Lead::calendar_range(state.pool(), current.company.id, &current.scope, from, to).await?;
    let events = leads.iter().filter_map(CalendarEvent::from_lead).collect();

    Ok(ApiResponse::success(CalendarResponse {
        start: range.start,
        end: range.end,
        days: group_by_day(events),
    }))
}
