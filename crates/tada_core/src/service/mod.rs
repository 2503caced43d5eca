//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep front-ends (CLI, HTTP) decoupled from storage details.

pub mod data_service;
pub mod echo_service;
pub mod list_service;
pub mod settings_service;
pub mod summary_service;
pub mod task_service;
