//! Project domain model.
//!
//! # Responsibility
//! - Define the project record and its manual assignment ledger.
//! - Provide status helpers with permissive (graph-free) semantics.
//!
//! # Invariants
//! - `manual_ledger` holds only ids the owner assigned directly; task-derived
//!   assignments are never copied into it implicitly.
//! - `version` is owned by storage and only moves forward.
//! - Cancelling is a status change; projects are never physically removed.

use crate::model::employee::EmployeeId;
use crate::model::now_epoch_ms;
use crate::model::status::ProjectStatus;
use crate::model::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for projects.
pub type ProjectId = Uuid;

/// Project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub client: String,
    pub status: ProjectStatus,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Employee ids assigned directly to the project.
    pub manual_ledger: BTreeSet<EmployeeId>,
    /// Optimistic concurrency stamp. Zero until first persisted.
    #[serde(default)]
    pub version: u64,
}

impl Project {
    /// Creates a pending project with an empty ledger.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        client: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description: description.into().trim().to_string(),
            client: client.into().trim().to_string(),
            status: ProjectStatus::Pending,
            created_at: now_epoch_ms(),
            manual_ledger: BTreeSet::new(),
            version: 0,
        }
    }

    /// Creates a project with a caller-provided stable id.
    pub fn with_id(
        id: ProjectId,
        name: impl Into<String>,
        description: impl Into<String>,
        client: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if id.is_nil() {
            return Err(ValidationError::NilUuid);
        }
        let mut project = Self::new(name, description, client);
        project.id = id;
        Ok(project)
    }

    /// Sets any enumerated status regardless of the current one.
    pub fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
    }

    pub fn finish(&mut self) {
        self.status = ProjectStatus::Done;
    }

    /// Soft-deletes the project.
    pub fn cancel(&mut self) {
        self.status = ProjectStatus::Cancelled;
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_closed()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilUuid);
        }
        require_text("project name", &self.name)?;
        if self.manual_ledger.iter().any(Uuid::is_nil) {
            return Err(ValidationError::NilUuid);
        }
        Ok(())
    }
}
