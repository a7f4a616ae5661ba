//! Domain model for employees, projects and tasks.
//!
//! # Responsibility
//! - Define canonical records shared by every storage backend.
//! - Keep lifecycle helpers (status changes, hour logging) side-effect free
//!   with respect to storage.
//!
//! # Invariants
//! - Every record is identified by a stable, non-nil UUID.
//! - Projects and tasks are never physically removed; termination is a
//!   status transition (Cancelled / Deleted).
//! - Employees are hard-deleted, but only through the assignment cascade.

pub mod employee;
pub mod project;
pub mod status;
pub mod task;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Record collection a stable id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employee,
    Project,
    Task,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee => write!(f, "employee"),
            Self::Project => write!(f, "project"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
