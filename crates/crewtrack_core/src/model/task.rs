//! Task domain model.
//!
//! # Responsibility
//! - Define the task record owned by exactly one project.
//! - Provide hour logging and status helpers.
//!
//! # Invariants
//! - `project_id` always names one owning project.
//! - Hour counters are finite and non-negative.
//! - Deleting a task is a transition to `TaskStatus::Deleted`.

use crate::model::employee::EmployeeId;
use crate::model::now_epoch_ms;
use crate::model::project::ProjectId;
use crate::model::status::TaskStatus;
use crate::model::validation::{require_hour_entry, require_hours, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for tasks.
pub type TaskId = Uuid;

/// Task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub name: String,
    pub estimated_hours: f64,
    pub logged_hours: f64,
    /// Employee ids assigned to this specific task.
    pub assignees: BTreeSet<EmployeeId>,
    pub status: TaskStatus,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Task {
    /// Creates a pending task under `project_id` with no hours and no assignees.
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into().trim().to_string(),
            estimated_hours: 0.0,
            logged_hours: 0.0,
            assignees: BTreeSet::new(),
            status: TaskStatus::Pending,
            created_at: now_epoch_ms(),
        }
    }

    /// Adds worked hours. Increments must be strictly positive.
    pub fn log_hours(&mut self, hours: f64) -> Result<(), ValidationError> {
        require_hour_entry(hours)?;
        self.logged_hours += hours;
        Ok(())
    }

    /// Sets any enumerated status regardless of the current one.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn soft_delete(&mut self) {
        self.status = TaskStatus::Deleted;
    }

    pub fn is_deleted(&self) -> bool {
        self.status == TaskStatus::Deleted
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() || self.project_id.is_nil() {
            return Err(ValidationError::NilUuid);
        }
        require_text("task name", &self.name)?;
        require_hours("estimated_hours", self.estimated_hours)?;
        require_hours("logged_hours", self.logged_hours)?;
        if self.assignees.iter().any(Uuid::is_nil) {
            return Err(ValidationError::NilUuid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use crate::model::status::TaskStatus;
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn log_hours_accumulates_positive_entries() {
        let mut task = Task::new(Uuid::new_v4(), "Schema design");
        task.log_hours(1.5).unwrap();
        task.log_hours(2.0).unwrap();
        assert_eq!(task.logged_hours, 3.5);
    }

    #[test]
    fn log_hours_rejects_zero_and_negative_entries() {
        let mut task = Task::new(Uuid::new_v4(), "Schema design");
        assert_eq!(
            task.log_hours(0.0),
            Err(ValidationError::NonPositiveHourEntry(0.0))
        );
        assert!(task.log_hours(-3.0).is_err());
        assert_eq!(task.logged_hours, 0.0);
    }

    #[test]
    fn deleted_task_can_be_reopened() {
        let mut task = Task::new(Uuid::new_v4(), "Deploy");
        task.soft_delete();
        assert!(task.is_deleted());
        task.set_status(TaskStatus::Pending);
        assert!(!task.is_deleted());
    }

    #[test]
    fn validate_rejects_negative_estimate() {
        let mut task = Task::new(Uuid::new_v4(), "Deploy");
        task.estimated_hours = -1.0;
        assert!(matches!(
            task.validate(),
            Err(ValidationError::InvalidHours {
                field: "estimated_hours",
                ..
            })
        ));
    }
}
