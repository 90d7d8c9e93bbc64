use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::crm::{CrmTask, TaskFilter};
use crate::leads::LeadScope;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TaskParams {
    pub completed: Option<bool>,
}

/// Office managers see every task; field users only their own
pub fn task_filter(scope: &LeadScope, params: &TaskParams) -> Option<TaskFilter> {
    if scope.is_empty() {
        return None;
    }
    Some(TaskFilter {
        lead_id: None,
        assignee_id: scope.crm_user_id().map(str::to_string),
        completed: params.completed,
    })
}

/// GET /api/tasks?completed= - CRM tasks visible to the caller
pub async fn tasks_get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<TaskParams>,
) -> ApiResult<Vec<CrmTask>> {
    let Some(filter) = task_filter(&current.scope, &params) else {
        return Ok(ApiResponse::success(Vec::new()));
    };

    let api = state.crm_for(&current.company)?;
    let tasks = api.list_tasks(&filter, state.config.crm.page_size).await?;
    Ok(ApiResponse::success(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_users_are_limited_to_their_tasks() {
        let params = TaskParams { completed: Some(false) };

        let office = task_filter(&LeadScope::Company, &params).unwrap();
        assert_eq!(office.assignee_id, None);
        assert_eq!(office.completed, Some(false));

        let rep = task_filter(&LeadScope::SalesRep("rep-7".into()), &params).unwrap();
        assert_eq!(rep.assignee_id.as_deref(), Some("rep-7"));

        assert!(task_filter(&LeadScope::Nothing, &params).is_none());
    }
}
