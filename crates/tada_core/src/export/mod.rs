//! Outbound data formats.

pub mod ics;

pub use ics::{render_calendar, IcsOptions};
