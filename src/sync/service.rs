//! Background service that keeps every company's local lead mirror current.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::delta::{self, DeltaSyncOptions, PgLeadStore, SyncReport};
use super::SyncError;
use crate::config::{CrmConfig, SyncConfig};
use crate::crm::{CrmConnector, CrmError};
use crate::crypto::CredentialCipher;
use crate::database::models::{Company, SyncRun};
use crate::database::DatabaseManager;

pub struct DeltaSyncService {
    db: DatabaseManager,
    connector: Arc<dyn CrmConnector>,
    cipher: Arc<CredentialCipher>,
    config: SyncConfig,
    options: DeltaSyncOptions,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Removes the company from the in-flight set when the run ends, however it ends
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    company_id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.company_id);
        }
    }
}

impl DeltaSyncService {
    pub fn new(
        db: DatabaseManager,
        connector: Arc<dyn CrmConnector>,
        cipher: Arc<CredentialCipher>,
        config: SyncConfig,
        crm: &CrmConfig,
    ) -> Self {
        let options = DeltaSyncOptions {
            page_size: crm.page_size,
            max_pages: crm.max_pages,
            overlap: chrono::Duration::seconds(config.overlap_secs.max(0)),
        };
        Self {
            db,
            connector,
            cipher,
            config,
            options,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Spawn the periodic sync loop
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.start().await })
    }

    async fn start(&self) {
        let tick = Duration::from_secs(self.config.tick_secs.max(1));
        info!(
            tick = ?tick,
            max_concurrent = self.config.max_concurrent_companies,
            "Starting delta sync service"
        );

        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_due().await {
                error!("Error selecting companies to sync: {}", e);
            }
        }
    }

    /// Sync every company whose interval has elapsed; returns how many were attempted
    pub async fn run_due(&self) -> Result<usize, SyncError> {
        let now = Utc::now();
        let due: Vec<Company> = Company::list_sync_enabled(self.db.pool())
            .await?
            .into_iter()
            .filter(|c| c.sync_due(now) && !self.is_running(c.id))
            .collect();

        if due.is_empty() {
            debug!("Delta sync: nothing due");
            return Ok(0);
        }

        let attempted = due.len();
        stream::iter(due)
            .for_each_concurrent(self.config.max_concurrent_companies.max(1), |company| async move {
                match self.sync_company(company.id, false).await {
                    Ok(report) => info!(
                        company = %company.slug,
                        fetched = report.fetched,
                        changed = report.changed,
                        written = report.written,
                        "Delta sync finished"
                    ),
                    Err(SyncError::AlreadyRunning(_)) => {
                        debug!(company = %company.slug, "Delta sync skipped, already running")
                    }
                    Err(e) => warn!(company = %company.slug, error = %e, "Delta sync failed"),
                }
            })
            .await;

        Ok(attempted)
    }

    pub fn is_running(&self, company_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&company_id))
            .unwrap_or(false)
    }

    fn claim(&self, company_id: Uuid) -> Result<InFlight<'_>, SyncError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| SyncError::AlreadyRunning(company_id))?;
        if !set.insert(company_id) {
            return Err(SyncError::AlreadyRunning(company_id));
        }
        Ok(InFlight {
            set: &self.in_flight,
            company_id,
        })
    }

    /// Run one sync for a company now. `full` ignores the watermark and prunes
    /// leads the CRM no longer has.
    pub async fn sync_company(&self, company_id: Uuid, full: bool) -> Result<SyncReport, SyncError> {
        let _guard = self.claim(company_id)?;
        let pool = self.db.pool();

        let company = Company::find_by_id(pool, company_id)
            .await?
            .ok_or(SyncError::CompanyNotFound(company_id))?;
        let sealed = company
            .crm_credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(SyncError::Crm(CrmError::MissingCredential))?;

        let run = SyncRun::start(pool, company_id, full).await?;
        let since = if full { None } else { company.sync_watermark };

        match self.pull(company_id, sealed, since).await {
            Ok(report) => {
                SyncRun::finish(pool, run.id, report.fetched, report.changed, report.written).await?;
                if !Company::mark_synced(pool, company_id, sealed, report.watermark).await? {
                    warn!(
                        company = %company.slug,
                        "CRM credential changed during sync, watermark left for a full resync"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                if let Err(record_err) = SyncRun::fail(pool, run.id, &e.to_string()).await {
                    error!(run_id = %run.id, error = %record_err, "Could not record failed sync run");
                }
                Err(e)
            }
        }
    }

    async fn pull(
        &self,
        company_id: Uuid,
        sealed_credential: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        let credential = self.cipher.decrypt(sealed_credential)?;
        let api = self.connector.connect(&credential);
        let store = PgLeadStore::new(self.db.pool().clone());
        delta::run(api.as_ref(), &store, company_id, since, &self.options).await
    }
}
