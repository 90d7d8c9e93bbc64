use axum::{
    extract::{Query, State},
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::database::models::{Lead, LeadQuery};
use crate::leads::LeadView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl LeadListParams {
    pub fn into_query(self, api: &ApiConfig) -> LeadQuery {
        LeadQuery {
            status: self.status,
            search: self.q,
            page: self.page.unwrap_or(1).max(1),
            limit: self
                .limit
                .unwrap_or(api.default_page_size)
                .clamp(1, api.max_page_size.max(1)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeadPage {
    pub leads: Vec<LeadView>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// GET /api/leads?status=&q=&page=&limit= - Role-scoped page of the local mirror
pub async fn leads_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<LeadListParams>,
) -> ApiResult<LeadPage> {
    let query = params.into_query(&state.config.api);
    let (rows, total) = Lead::search(state.pool(), current.company.id, &current.scope, &query).await?;

    Ok(ApiResponse::success(LeadPage {
        leads: rows.iter().map(LeadView::from).collect(),
        total,
        page: query.page,
        limit: query.limit,
    }))
}
