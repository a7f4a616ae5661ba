//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own the assignment rules (reconciliation and cascades) so every storage
//!   backend only executes primitive writes.

pub mod cascade_coordinator;
pub mod employee_service;
pub mod error;
pub mod project_service;
pub mod relation_reconciler;
pub mod task_service;
