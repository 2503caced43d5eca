pub mod calendar;
pub mod error;
pub mod health;
pub mod sync;
