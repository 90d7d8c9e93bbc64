// Remote CRM shapes, as returned by its GraphQL surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmLead {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub source: Option<String>,
    #[serde(default)]
    pub address: Option<CrmAddress>,
    #[serde(default)]
    pub sales_rep: Option<CrmRef>,
    #[serde(default)]
    pub canvasser: Option<CrmRef>,
    #[serde(default)]
    pub project_manager: Option<CrmRef>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee: Option<CrmRef>,
    #[serde(default)]
    pub lead: Option<CrmRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmNote {
    pub id: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<CrmRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Relay-style paginated list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    pub fn single_page(nodes: Vec<T>) -> Self {
        Self {
            nodes,
            page_info: PageInfo::default(),
        }
    }
}

/// Fields a dashboard user may change on a lead. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_at: Option<DateTime<Utc>>,
}

impl LeadUpdateInput {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.status.is_none()
            && self.appointment_at.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_lead_with_missing_optional_relations() {
        let lead: CrmLead = serde_json::from_value(json!({
            "id": "L-1",
            "firstName": "Dana",
            "lastName": null,
            "email": null,
            "phone": "555-0100",
            "status": "new",
            "source": null,
            "appointmentAt": null,
            "createdAt": "2025-03-01T10:00:00Z",
            "updatedAt": "2025-03-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(lead.id, "L-1");
        assert!(lead.sales_rep.is_none());
        assert!(lead.address.is_none());
        assert_eq!(lead.updated_at.to_rfc3339(), "2025-03-02T10:00:00+00:00");
    }

    #[test]
    fn update_input_omits_unset_fields() {
        let input = LeadUpdateInput {
            status: Some("contacted".to_string()),
            ..Default::default()
        };
        assert!(!input.is_empty());
        assert_eq!(serde_json::to_value(&input).unwrap(), json!({ "status": "contacted" }));
        assert!(LeadUpdateInput::default().is_empty());
    }

    #[test]
    fn connection_defaults_page_info() {
        let page: Connection<CrmRef> = serde_json::from_value(json!({
            "nodes": [{ "id": "u1" }]
        }))
        .unwrap();
        assert!(!page.page_info.has_next_page);
        assert_eq!(page.nodes[0].id, "u1");
    }
}
