// Fixed GraphQL documents sent to the CRM. Field selections must stay in
// step with the structs in `crm::types`.

const LEAD_FIELDS: &str = r#"
    id
    firstName
    lastName
    email
    phone
    status
    source
    address { street city state postalCode }
    salesRep { id name }
    canvasser { id name }
    projectManager { id name }
    appointmentAt
    createdAt
    updatedAt
"#;

const TASK_FIELDS: &str = r#"
    id
    title
    description
    dueAt
    completed
    assignee { id name }
    lead { id name }
"#;

pub fn leads_query() -> String {
    format!(
        r#"query Leads($first: Int!, $after: String) {{
  leads(first: $first, after: $after) {{
    nodes {{ {LEAD_FIELDS} }}
    pageInfo {{ hasNextPage endCursor }}
  }}
}}"#
    )
}

pub fn lead_query() -> String {
    format!(
        r#"query Lead($id: ID!) {{
  lead(id: $id) {{ {LEAD_FIELDS} }}
}}"#
    )
}

pub fn update_lead_mutation() -> String {
    format!(
        r#"mutation UpdateLead($id: ID!, $input: LeadUpdateInput!) {{
  updateLead(id: $id, input: $input) {{
    lead {{ {LEAD_FIELDS} }}
  }}
}}"#
    )
}

pub const CREATE_NOTE_MUTATION: &str = r#"mutation CreateNote($leadId: ID!, $body: String!) {
  createNote(leadId: $leadId, body: $body) {
    note { id body createdAt author { id name } }
  }
}"#;

pub fn tasks_query() -> String {
    format!(
        r#"query Tasks($filter: TaskFilter, $first: Int!) {{
  tasks(filter: $filter, first: $first) {{
    nodes {{ {TASK_FIELDS} }}
    pageInfo {{ hasNextPage endCursor }}
  }}
}}"#
    )
}

/// REST path answering with the user that owns the credential
pub const CURRENT_USER_PATH: &str = "/v1/me";

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(doc: &str) -> bool {
        let mut depth = 0i32;
        for c in doc.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
        }
        depth == 0
    }

    #[test]
    fn documents_have_balanced_braces() {
        for doc in [
            leads_query(),
            lead_query(),
            update_lead_mutation(),
            CREATE_NOTE_MUTATION.to_string(),
            tasks_query(),
        ] {
            assert!(balanced(&doc), "unbalanced document:\n{doc}");
        }
    }

    #[test]
    fn lead_documents_select_the_sync_timestamp() {
        assert!(leads_query().contains("updatedAt"));
        assert!(leads_query().contains("pageInfo { hasNextPage endCursor }"));
        assert!(update_lead_mutation().contains("updatedAt"));
    }
}
