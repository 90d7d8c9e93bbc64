use std::sync::Arc;

use crate::config::AppConfig;
use crate::crm::{CrmApi, CrmConnector, HttpCrmConnector};
use crate::crypto::CredentialCipher;
use crate::database::models::Company;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::sync::DeltaSyncService;

/// Shared handles for every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseManager,
    pub connector: Arc<dyn CrmConnector>,
    pub cipher: Arc<CredentialCipher>,
    pub sync: Arc<DeltaSyncService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DatabaseManager,
        connector: Arc<dyn CrmConnector>,
        cipher: CredentialCipher,
    ) -> Self {
        let cipher = Arc::new(cipher);
        let sync = Arc::new(DeltaSyncService::new(
            db.clone(),
            connector.clone(),
            cipher.clone(),
            config.sync.clone(),
            &config.crm,
        ));
        Self {
            config: Arc::new(config),
            db,
            connector,
            cipher,
            sync,
        }
    }

    /// Wire the production CRM connector and credential cipher from config
    pub fn from_config(config: AppConfig, db: DatabaseManager) -> anyhow::Result<Self> {
        let connector = HttpCrmConnector::new(config.crm.clone())?;
        let cipher = CredentialCipher::from_config(&config.security, config.environment)?;
        Ok(Self::new(config, db, Arc::new(connector), cipher))
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.db.pool()
    }

    /// CRM client bound to the company's decrypted credential
    pub fn crm_for(&self, company: &Company) -> Result<Arc<dyn CrmApi>, ApiError> {
        let sealed = company
            .crm_credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(crate::crm::CrmError::MissingCredential)?;
        let credential = self.cipher.decrypt(sealed)?;
        Ok(self.connector.connect(&credential))
    }
}
