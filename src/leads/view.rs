// Frontend-facing lead shape. Both proxied CRM reads and local mirror rows
// are reshaped into this so the dashboard renders one format.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crm::{CrmLead, CrmRef};
use crate::database::models::lead::Lead;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignee {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&CrmRef> for Assignee {
    fn from(r: &CrmRef) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
        }
    }
}

fn id_only(id: &Option<String>) -> Option<Assignee> {
    id.as_ref().map(|id| Assignee { id: id.clone(), name: None })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub id: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub sales_rep: Option<Assignee>,
    pub canvasser: Option<Assignee>,
    pub project_manager: Option<Assignee>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        "Unnamed lead".to_string()
    } else {
        parts.join(" ")
    }
}

/// "street, city, state postal" with missing pieces dropped
pub fn format_address(
    street: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    postal_code: Option<&str>,
) -> Option<String> {
    fn clean(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    let region = [clean(state), clean(postal_code)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let parts: Vec<String> = [clean(street).map(String::from), clean(city).map(String::from)]
        .into_iter()
        .flatten()
        .chain((!region.is_empty()).then_some(region))
        .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

impl From<&CrmLead> for LeadView {
    fn from(lead: &CrmLead) -> Self {
        let address = lead.address.as_ref().and_then(|a| {
            format_address(
                a.street.as_deref(),
                a.city.as_deref(),
                a.state.as_deref(),
                a.postal_code.as_deref(),
            )
        });

        Self {
            id: lead.id.clone(),
            name: display_name(lead.first_name.as_deref(), lead.last_name.as_deref()),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            address,
            status: lead.status.clone(),
            source: lead.source.clone(),
            sales_rep: lead.sales_rep.as_ref().map(Assignee::from),
            canvasser: lead.canvasser.as_ref().map(Assignee::from),
            project_manager: lead.project_manager.as_ref().map(Assignee::from),
            appointment_at: lead.appointment_at,
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

impl From<&Lead> for LeadView {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.external_id.clone(),
            name: display_name(lead.first_name.as_deref(), lead.last_name.as_deref()),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            address: format_address(
                lead.street.as_deref(),
                lead.city.as_deref(),
                lead.state.as_deref(),
                lead.postal_code.as_deref(),
            ),
            status: lead.status.clone(),
            source: lead.source.clone(),
            sales_rep: id_only(&lead.sales_rep_id),
            canvasser: id_only(&lead.canvasser_id),
            project_manager: id_only(&lead.project_manager_id),
            appointment_at: lead.appointment_at,
            created_at: lead.remote_created_at,
            updated_at: lead.remote_updated_at,
        }
    }
}
