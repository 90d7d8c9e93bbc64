use crate::auth::Role;

/// Which of a company's leads a user may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadScope {
    /// Every lead in the company
    Company,
    SalesRep(String),
    Canvasser(String),
    ProjectManager(String),
    /// Field user not yet linked to a CRM user
    Nothing,
}

impl LeadScope {
    pub fn for_user(role: Role, crm_user_id: Option<&str>) -> Self {
        if role.is_office() {
            return LeadScope::Company;
        }

        let Some(id) = crm_user_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return LeadScope::Nothing;
        };

        match role {
            Role::SalesRep => LeadScope::SalesRep(id.to_string()),
            Role::Canvasser => LeadScope::Canvasser(id.to_string()),
            Role::ProjectManager => LeadScope::ProjectManager(id.to_string()),
            Role::OfficeManager => LeadScope::Company,
        }
    }

    /// Local column and value restricting a query to this scope, if any
    pub fn assignee_filter(&self) -> Option<(&'static str, &str)> {
        match self {
            LeadScope::SalesRep(id) => Some(("sales_rep_id", id)),
            LeadScope::Canvasser(id) => Some(("canvasser_id", id)),
            LeadScope::ProjectManager(id) => Some(("project_manager_id", id)),
            LeadScope::Company | LeadScope::Nothing => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LeadScope::Nothing)
    }

    pub fn permits(
        &self,
        sales_rep_id: Option<&str>,
        canvasser_id: Option<&str>,
        project_manager_id: Option<&str>,
    ) -> bool {
        match self {
            LeadScope::Company => true,
            LeadScope::Nothing => false,
            LeadScope::SalesRep(id) => sales_rep_id == Some(id.as_str()),
            LeadScope::Canvasser(id) => canvasser_id == Some(id.as_str()),
            LeadScope::ProjectManager(id) => project_manager_id == Some(id.as_str()),
        }
    }

    /// Assignee id used when asking the CRM for "my" tasks
    pub fn crm_user_id(&self) -> Option<&str> {
        self.assignee_filter().map(|(_, id)| id)
    }
}
