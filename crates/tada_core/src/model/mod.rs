//! Domain model for tasks, lists, AI digests, profile and settings.
//!
//! # Responsibility
//! - Define the plain records persisted by core and exchanged as JSON.
//!
//! # Invariants
//! - Every record is identified by a stable string id.
//! - Timestamps are epoch milliseconds.

pub mod list;
pub mod profile;
pub mod settings;
pub mod summary;
pub mod task;
