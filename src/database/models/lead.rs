use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::crm::CrmLead;
use crate::database::manager::DatabaseError;
use crate::leads::LeadScope;

const LEAD_COLUMNS: &str = r#"
    id, company_id, external_id, first_name, last_name, email, phone, street, city, state,
    postal_code, status, source, sales_rep_id, canvasser_id, project_manager_id,
    appointment_at, remote_created_at, remote_updated_at, synced_at
"#;

/// Local mirror of a CRM lead
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub company_id: Uuid,
    pub external_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub sales_rep_id: Option<String>,
    pub canvasser_id: Option<String>,
    pub project_manager_id: Option<String>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub remote_created_at: Option<DateTime<Utc>>,
    pub remote_updated_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

/// Row written by sync, webhooks and proxied mutations
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub company_id: Uuid,
    pub external_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub status: String,
    pub source: Option<String>,
    pub sales_rep_id: Option<String>,
    pub canvasser_id: Option<String>,
    pub project_manager_id: Option<String>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub remote_created_at: Option<DateTime<Utc>>,
    pub remote_updated_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn from_crm(company_id: Uuid, lead: &CrmLead) -> Self {
        let address = lead.address.clone().unwrap_or_default();
        Self {
            company_id,
            external_id: lead.id.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            street: address.street,
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            status: lead.status.clone(),
            source: lead.source.clone(),
            sales_rep_id: lead.sales_rep.as_ref().map(|r| r.id.clone()),
            canvasser_id: lead.canvasser.as_ref().map(|r| r.id.clone()),
            project_manager_id: lead.project_manager.as_ref().map(|r| r.id.clone()),
            appointment_at: lead.appointment_at,
            remote_created_at: lead.created_at,
            remote_updated_at: lead.updated_at,
        }
    }

    pub fn visible_to(&self, scope: &LeadScope) -> bool {
        scope.permits(
            self.sales_rep_id.as_deref(),
            self.canvasser_id.as_deref(),
            self.project_manager_id.as_deref(),
        )
    }
}

/// Filters for the lead list endpoint
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl LeadQuery {
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1) as i64 * self.limit as i64
    }
}

// Last write wins on remote_updated_at; replays and stale events are no-ops.
const UPSERT_SQL: &str = r#"
    INSERT INTO leads (
        company_id, external_id, first_name, last_name, email, phone, street, city, state,
        postal_code, status, source, sales_rep_id, canvasser_id, project_manager_id,
        appointment_at, remote_created_at, remote_updated_at, synced_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
    ON CONFLICT (company_id, external_id) DO UPDATE SET
        first_name = EXCLUDED.first_name,
        last_name = EXCLUDED.last_name,
        email = EXCLUDED.email,
        phone = EXCLUDED.phone,
        street = EXCLUDED.street,
        city = EXCLUDED.city,
        state = EXCLUDED.state,
        postal_code = EXCLUDED.postal_code,
        status = EXCLUDED.status,
        source = EXCLUDED.source,
        sales_rep_id = EXCLUDED.sales_rep_id,
        canvasser_id = EXCLUDED.canvasser_id,
        project_manager_id = EXCLUDED.project_manager_id,
        appointment_at = EXCLUDED.appointment_at,
        remote_created_at = EXCLUDED.remote_created_at,
        remote_updated_at = EXCLUDED.remote_updated_at,
        synced_at = EXCLUDED.synced_at
    WHERE leads.remote_updated_at < EXCLUDED.remote_updated_at
"#;

fn bind_record<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    record: &'q LeadRecord,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(record.company_id)
        .bind(&record.external_id)
        .bind(record.first_name.as_deref())
        .bind(record.last_name.as_deref())
        .bind(record.email.as_deref())
        .bind(record.phone.as_deref())
        .bind(record.street.as_deref())
        .bind(record.city.as_deref())
        .bind(record.state.as_deref())
        .bind(record.postal_code.as_deref())
        .bind(&record.status)
        .bind(record.source.as_deref())
        .bind(record.sales_rep_id.as_deref())
        .bind(record.canvasser_id.as_deref())
        .bind(record.project_manager_id.as_deref())
        .bind(record.appointment_at)
        .bind(record.remote_created_at)
        .bind(record.remote_updated_at)
        .bind(Utc::now())
}

impl Lead {
    /// Upsert one record; returns whether a row was written
    pub async fn upsert(pool: &PgPool, record: &LeadRecord) -> Result<bool, DatabaseError> {
        let result = bind_record(sqlx::query(UPSERT_SQL), record).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert a batch in one transaction; returns rows written
    pub async fn upsert_many(pool: &PgPool, records: &[LeadRecord]) -> Result<u64, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut written = 0;
        for record in records {
            let result = bind_record(sqlx::query(UPSERT_SQL), record)
                .execute(&mut *tx)
                .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }

    pub async fn find_by_external_id(
        pool: &PgPool,
        company_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Self>, DatabaseError> {
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE company_id = $1 AND external_id = $2"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(company_id)
            .bind(external_id)
            .fetch_optional(pool)
            .await?)
    }

    pub async fn delete_by_external_id(
        pool: &PgPool,
        company_id: Uuid,
        external_id: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM leads WHERE company_id = $1 AND external_id = $2")
            .bind(company_id)
            .bind(external_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove mirrored leads the CRM no longer returns; used after a full resync.
    /// Rows written at or after `synced_before` (webhooks landing mid-pass) are kept.
    pub async fn delete_missing(
        pool: &PgPool,
        company_id: Uuid,
        keep_external_ids: &[String],
        synced_before: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM leads
             WHERE company_id = $1 AND NOT (external_id = ANY($2)) AND synced_at < $3",
        )
        .bind(company_id)
        .bind(keep_external_ids)
        .bind(synced_before)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Role-scoped, filtered page of leads plus the total match count
    pub async fn search(
        pool: &PgPool,
        company_id: Uuid,
        scope: &LeadScope,
        query: &LeadQuery,
    ) -> Result<(Vec<Self>, i64), DatabaseError> {
        if scope.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads");
        push_filters(&mut count, company_id, scope, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {LEAD_COLUMNS} FROM leads"));
        push_filters(&mut select, company_id, scope, query);
        select
            .push(" ORDER BY remote_updated_at DESC, external_id LIMIT ")
            .push_bind(query.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let rows = select.build_query_as::<Self>().fetch_all(pool).await?;

        Ok((rows, total))
    }

    /// Leads with an appointment in `[from, to)`, earliest first
    pub async fn calendar_range(
        pool: &PgPool,
        company_id: Uuid,
        scope: &LeadScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>, DatabaseError> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {LEAD_COLUMNS} FROM leads"));
        push_scope(&mut select, company_id, scope);
        select
            .push(" AND appointment_at >= ")
            .push_bind(from)
            .push(" AND appointment_at < ")
            .push_bind(to)
            .push(" ORDER BY appointment_at ASC, external_id");
        Ok(select.build_query_as::<Self>().fetch_all(pool).await?)
    }

    pub fn visible_to(&self, scope: &LeadScope) -> bool {
        scope.permits(
            self.sales_rep_id.as_deref(),
            self.canvasser_id.as_deref(),
            self.project_manager_id.as_deref(),
        )
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, company_id: Uuid, scope: &LeadScope) {
    builder.push(" WHERE company_id = ").push_bind(company_id);
    if let Some((column, id)) = scope.assignee_filter() {
        builder.push(format!(" AND {column} = ")).push_bind(id.to_string());
    }
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    company_id: Uuid,
    scope: &LeadScope,
    query: &LeadQuery,
) {
    push_scope(builder, company_id, scope);

    if let Some(status) = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND status = ").push_bind(status.to_string());
    }

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (concat_ws(' ', first_name, last_name) ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR concat_ws(' ', street, city, state, postal_code) ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape LIKE metacharacters so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{CrmAddress, CrmRef};

    fn crm_lead() -> CrmLead {
        CrmLead {
            id: "L-42".to_string(),
            first_name: Some("Dana".to_string()),
            last_name: Some("Reyes".to_string()),
            email: Some("dana@example.com".to_string()),
            phone: None,
            status: "appointment_set".to_string(),
            source: Some("door_knock".to_string()),
            address: Some(CrmAddress {
                street: Some("12 Elm St".to_string()),
                city: Some("Tulsa".to_string()),
                state: Some("OK".to_string()),
                postal_code: Some("74103".to_string()),
            }),
            sales_rep: Some(CrmRef { id: "rep-1".to_string(), name: None }),
            canvasser: Some(CrmRef { id: "can-1".to_string(), name: None }),
            project_manager: None,
            appointment_at: None,
            created_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn record_flattens_address_and_assignees() {
        let company_id = Uuid::new_v4();
        let record = LeadRecord::from_crm(company_id, &crm_lead());
        assert_eq!(record.company_id, company_id);
        assert_eq!(record.external_id, "L-42");
        assert_eq!(record.city.as_deref(), Some("Tulsa"));
        assert_eq!(record.sales_rep_id.as_deref(), Some("rep-1"));
        assert_eq!(record.canvasser_id.as_deref(), Some("can-1"));
        assert_eq!(record.project_manager_id, None);
    }

    #[test]
    fn record_visibility_follows_scope() {
        let record = LeadRecord::from_crm(Uuid::new_v4(), &crm_lead());
        assert!(record.visible_to(&LeadScope::Company));
        assert!(record.visible_to(&LeadScope::SalesRep("rep-1".to_string())));
        assert!(record.visible_to(&LeadScope::Canvasser("can-1".to_string())));
        assert!(!record.visible_to(&LeadScope::ProjectManager("rep-1".to_string())));
    }

    #[test]
    fn offsets_are_one_based_pages() {
        let q = LeadQuery { page: 3, limit: 25, ..Default::default() };
        assert_eq!(q.offset(), 50);
        let q = LeadQuery { page: 0, limit: 25, ..Default::default() };
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Elm"), "Elm");
    }

    #[test]
    fn scoped_filters_build_expected_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads");
        let query = LeadQuery {
            status: Some("new".to_string()),
            search: Some("elm".to_string()),
            page: 1,
            limit: 10,
        };
        push_filters(
            &mut builder,
            Uuid::new_v4(),
            &LeadScope::SalesRep("rep-1".to_string()),
            &query,
        );
        let sql = builder.sql();
        assert!(sql.contains("WHERE company_id = $1"));
        assert!(sql.contains("AND sales_rep_id = $2"));
        assert!(sql.contains("AND status = $3"));
        assert!(sql.contains("OR phone ILIKE $6"));
    }
}
