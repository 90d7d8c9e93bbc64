pub mod list;
pub mod notes;
pub mod record;
pub mod utils;

pub use list::leads_get;
pub use notes::notes_post;
pub use record::{lead_get, lead_patch, lead_tasks_get};
