pub mod calendar;
pub mod scope;
pub mod view;

pub use calendar::{group_by_day, CalendarDay, CalendarError, CalendarEvent, CalendarRange};
pub use scope::LeadScope;
pub use view::{Assignee, LeadView};
