pub mod delta;
pub mod service;

use thiserror::Error;
use uuid::Uuid;

use crate::crm::CrmError;
use crate::crypto::CryptoError;
use crate::database::DatabaseError;

pub use delta::{DeltaSyncOptions, LeadStore, PgLeadStore, SyncReport};
pub use service::DeltaSyncService;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("CRM request failed: {0}")]
    Crm(#[from] CrmError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("could not decrypt CRM credential: {0}")]
    Credential(#[from] CryptoError),

    #[error("gave up after {0} pages")]
    TooManyPages(u32),

    #[error("CRM returned the same cursor twice: {0}")]
    StalledCursor(String),

    #[error("sync already running for company {0}")]
    AlreadyRunning(Uuid),

    #[error("company {0} not found")]
    CompanyNotFound(Uuid),
}
