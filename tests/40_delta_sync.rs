mod common;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::{lead_json, FakeCrm, CRM_TOKEN};
use leadboard::crm::{CrmConnector, HttpCrmConnector};
use leadboard::database::models::LeadRecord;
use leadboard::database::DatabaseError;
use leadboard::sync::{delta, DeltaSyncOptions, LeadStore, SyncError};

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<HashMap<String, LeadRecord>>,
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn upsert_leads(&self, records: &[LeadRecord]) -> Result<u64, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        let mut written = 0;
        for record in records {
            let newer = rows
                .get(&record.external_id)
                .map_or(true, |existing| existing.remote_updated_at < record.remote_updated_at);
            if newer {
                rows.insert(record.external_id.clone(), record.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn prune_missing(
        &self,
        _company_id: Uuid,
        keep: &[String],
        _synced_before: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|id, _| keep.contains(id));
        Ok((before - rows.len()) as u64)
    }
}

fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

fn options(crm: &FakeCrm) -> DeltaSyncOptions {
    DeltaSyncOptions {
        page_size: crm.crm_config().page_size,
        max_pages: 10,
        overlap: chrono::Duration::zero(),
    }
}

#[tokio::test]
async fn full_then_delta_sync_against_the_crm() -> Result<()> {
    let crm = FakeCrm::start(vec![
        lead_json("L1", "new", "2025-03-01T10:00:00Z", Some("rep-1")),
        lead_json("L2", "contacted", "2025-03-02T10:00:00Z", Some("rep-2")),
        lead_json("L3", "new", "2025-03-03T10:00:00Z", None),
    ])
    .await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);
    let store = MemoryStore::default();
    let company_id = Uuid::new_v4();
    let opts = options(&crm);

    let first = delta::run(api.as_ref(), &store, company_id, None, &opts).await?;
    assert!(first.full_resync);
    assert_eq!(first.pages, 2);
    assert_eq!(first.fetched, 3);
    assert_eq!(first.written, 3);
    assert_eq!(first.watermark, Some(ts("2025-03-03T10:00:00Z")));

    {
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows["L1"].sales_rep_id.as_deref(), Some("rep-1"));
        assert_eq!(rows["L1"].company_id, company_id);
    }

    // One remote edit after the watermark
    crm.state.leads.lock().unwrap()[1] =
        lead_json("L2", "appointment_set", "2025-03-04T08:00:00Z", Some("rep-2"));

    let second = delta::run(api.as_ref(), &store, company_id, first.watermark, &opts).await?;
    assert!(!second.full_resync);
    assert_eq!(second.fetched, 3);
    assert_eq!(second.changed, 1);
    assert_eq!(second.written, 1);
    assert_eq!(second.pruned, 0);
    assert_eq!(second.watermark, Some(ts("2025-03-04T08:00:00Z")));
    assert_eq!(store.rows.lock().unwrap()["L2"].status, "appointment_set");

    // Nothing new: the watermark holds and nothing is written
    let third = delta::run(api.as_ref(), &store, company_id, second.watermark, &opts).await?;
    assert_eq!(third.changed, 0);
    assert_eq!(third.written, 0);
    assert_eq!(third.watermark, second.watermark);
    Ok(())
}

#[tokio::test]
async fn full_resync_prunes_deleted_leads() -> Result<()> {
    let crm = FakeCrm::start(vec![
        lead_json("L1", "new", "2025-03-01T10:00:00Z", None),
        lead_json("L2", "new", "2025-03-02T10:00:00Z", None),
    ])
    .await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(CRM_TOKEN);
    let store = MemoryStore::default();
    let company_id = Uuid::new_v4();
    let opts = options(&crm);

    delta::run(api.as_ref(), &store, company_id, None, &opts).await?;
    crm.state.leads.lock().unwrap().remove(0);

    // A delta pass never deletes
    let delta_pass = delta::run(api.as_ref(), &store, company_id, Some(ts("2025-03-02T10:00:00Z")), &opts).await?;
    assert_eq!(delta_pass.pruned, 0);
    assert_eq!(store.rows.lock().unwrap().len(), 2);

    let full = delta::run(api.as_ref(), &store, company_id, None, &opts).await?;
    assert_eq!(full.pruned, 1);
    assert!(!store.rows.lock().unwrap().contains_key("L1"));
    Ok(())
}

#[tokio::test]
async fn revoked_credential_aborts_the_pass() -> Result<()> {
    let crm = FakeCrm::start(vec![lead_json("L1", "new", "2025-03-01T10:00:00Z", None)]).await?;
    let api = HttpCrmConnector::new(crm.crm_config())?.connect(common::REVOKED_TOKEN);
    let store = MemoryStore::default();

    let err = delta::run(api.as_ref(), &store, Uuid::new_v4(), None, &options(&crm))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Crm(leadboard::crm::CrmError::InvalidCredential)));
    assert!(store.rows.lock().unwrap().is_empty());
    Ok(())
}
