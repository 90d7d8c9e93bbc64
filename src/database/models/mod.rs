pub mod company;
pub mod lead;
pub mod sync_run;
pub mod user;

pub use company::{Company, CompanySettingsUpdate};
pub use lead::{Lead, LeadQuery, LeadRecord};
pub use sync_run::SyncRun;
pub use user::{NewUser, User};
