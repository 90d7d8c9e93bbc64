pub mod client;
pub mod queries;
pub mod types;

pub use client::{CrmApi, CrmClient, CrmConnector, CrmError, HttpCrmConnector};
pub use types::{
    Connection, CrmAddress, CrmLead, CrmNote, CrmRef, CrmTask, CrmUser, LeadUpdateInput, PageInfo,
    TaskFilter,
};
