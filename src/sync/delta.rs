//! One delta-sync pass: page through every remote lead, keep the ones modified
//! since the watermark, upsert them locally.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::SyncError;
use crate::crm::{CrmApi, CrmLead};
use crate::database::models::{Lead, LeadRecord};
use crate::database::DatabaseError;

const UPSERT_CHUNK: usize = 500;

/// Local destination for synced leads
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Returns the number of rows actually written
    async fn upsert_leads(&self, records: &[LeadRecord]) -> Result<u64, DatabaseError>;

    /// Delete the company's leads whose external id is not in `keep`, sparing
    /// rows written at or after `synced_before`
    async fn prune_missing(
        &self,
        company_id: Uuid,
        keep: &[String],
        synced_before: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;
}

pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn upsert_leads(&self, records: &[LeadRecord]) -> Result<u64, DatabaseError> {
        Lead::upsert_many(&self.pool, records).await
    }

    async fn prune_missing(
        &self,
        company_id: Uuid,
        keep: &[String],
        synced_before: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        Lead::delete_missing(&self.pool, company_id, keep, synced_before).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeltaSyncOptions {
    pub page_size: u32,
    pub max_pages: u32,
    /// Re-read this much history before the watermark to absorb remote clock skew
    pub overlap: Duration,
}

impl Default for DeltaSyncOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 500,
            overlap: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub company_id: Uuid,
    pub full_resync: bool,
    pub pages: u32,
    pub fetched: u64,
    pub changed: u64,
    pub written: u64,
    pub pruned: u64,
    pub previous_watermark: Option<DateTime<Utc>>,
    pub watermark: Option<DateTime<Utc>>,
}

/// Page through every remote lead
pub async fn fetch_all_leads(
    api: &dyn CrmApi,
    options: &DeltaSyncOptions,
) -> Result<(Vec<CrmLead>, u32), SyncError> {
    let mut leads = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0u32;

    loop {
        if pages >= options.max_pages {
            return Err(SyncError::TooManyPages(options.max_pages));
        }

        let page = api.list_leads(options.page_size, after.as_deref()).await?;
        pages += 1;
        debug!(page = pages, nodes = page.nodes.len(), "Fetched lead page");
        leads.extend(page.nodes);

        match page.page_info.end_cursor {
            Some(cursor) if page.page_info.has_next_page => {
                if after.as_deref() == Some(cursor.as_str()) {
                    return Err(SyncError::StalledCursor(cursor));
                }
                after = Some(cursor);
            }
            _ => break,
        }
    }

    Ok((leads, pages))
}

/// Leads modified after `since - overlap`; everything when there is no watermark
pub fn select_changed<'a>(
    leads: &'a [CrmLead],
    since: Option<DateTime<Utc>>,
    overlap: Duration,
) -> Vec<&'a CrmLead> {
    match since {
        None => leads.iter().collect(),
        Some(since) => {
            let cutoff = since - overlap;
            leads.iter().filter(|l| l.updated_at > cutoff).collect()
        }
    }
}

/// The new watermark never moves backwards
pub fn next_watermark(leads: &[CrmLead], previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    leads.iter().map(|l| l.updated_at).chain(previous).max()
}

pub async fn run(
    api: &dyn CrmApi,
    store: &dyn LeadStore,
    company_id: Uuid,
    since: Option<DateTime<Utc>>,
    options: &DeltaSyncOptions,
) -> Result<SyncReport, SyncError> {
    let started = Utc::now();
    let (leads, pages) = fetch_all_leads(api, options).await?;
    let changed = select_changed(&leads, since, options.overlap);

    let records: Vec<LeadRecord> = changed
        .iter()
        .map(|lead| LeadRecord::from_crm(company_id, lead))
        .collect();

    let mut written = 0;
    for chunk in records.chunks(UPSERT_CHUNK) {
        written += store.upsert_leads(chunk).await?;
    }

    // Only a full listing proves absence. Rows written since the listing
    // began may be newer than it.
    let pruned = if since.is_none() {
        let keep: Vec<String> = leads.iter().map(|l| l.id.clone()).collect();
        store.prune_missing(company_id, &keep, started).await?
    } else {
        0
    };

    Ok(SyncReport {
        company_id,
        full_resync: since.is_none(),
        pages,
        fetched: leads.len() as u64,
        changed: records.len() as u64,
        written,
        pruned,
        previous_watermark: since,
        watermark: next_watermark(&leads, since),
    })
}
