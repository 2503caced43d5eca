//! Calendar export service: receives task lists from Tada clients and
//! publishes them as a subscribable iCalendar feed.

pub mod app;
pub mod handlers;
pub mod state;
pub mod store;

pub use app::create_app;
pub use state::{AppState, CalendarConfig};
pub use store::TaskStore;
