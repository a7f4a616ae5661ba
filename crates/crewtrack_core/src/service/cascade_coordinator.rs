//! Employee removal cascades.
//!
//! # Responsibility
//! - Hard-delete an employee together with every reference to it.
//! - Remove an employee from one project's ledger and that project's tasks.
//!
//! # Invariants
//! - Each operation is a single assignment batch: either every write lands
//!   or none does.
//! - Cascades never change project or task status.
//! - A scoped removal never touches tasks owned by other projects.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::task::TaskId;
use crate::model::EntityKind;
use crate::repo::assignment_repo::{
    AssignmentBatch, AssignmentRepository, AssignmentScope, AssignmentWrite, BatchOutcome,
};
use crate::service::error::AssignmentError;
use log::{error, info, warn};
use std::collections::BTreeSet;

/// What a cascade changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub employee_id: EmployeeId,
    /// Projects whose ledger or task assignments lost the employee.
    pub projects_touched: BTreeSet<ProjectId>,
    pub tasks_touched: BTreeSet<TaskId>,
    /// True only for `delete_employee`.
    pub employee_deleted: bool,
}

impl CascadeReport {
    fn from_outcome(employee_id: EmployeeId, outcome: BatchOutcome) -> Self {
        Self {
            employee_id,
            projects_touched: outcome.projects_touched,
            tasks_touched: outcome.tasks_touched,
            employee_deleted: outcome.employee_deleted == Some(employee_id),
        }
    }
}

/// Coordinates employee removals over an assignment store.
pub struct CascadeCoordinator<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> CascadeCoordinator<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Removes the employee from every ledger and every task, then deletes
    /// the record.
    ///
    /// # Errors
    /// - `NotFound` if the employee does not exist.
    /// - `PartialCascadeFailure` if references survive the committed batch.
    pub fn delete_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<CascadeReport, AssignmentError> {
        if self.repo.find_employee(employee_id)?.is_none() {
            return Err(AssignmentError::NotFound {
                kind: EntityKind::Employee,
                id: employee_id,
            });
        }

        let targets = BTreeSet::from([employee_id]);
        let mut batch = AssignmentBatch::new();
        batch
            .push(AssignmentWrite::RemoveFromLedgers {
                scope: AssignmentScope::Global,
                employee_ids: targets.clone(),
            })
            .push(AssignmentWrite::RemoveFromTaskAssignments {
                scope: AssignmentScope::Global,
                employee_ids: targets,
            })
            .push(AssignmentWrite::DeleteEmployee { employee_id });

        let outcome = match self.repo.apply_batch(&batch) {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = AssignmentError::from(err);
                warn!(
                    "event=employee_delete module=service status=error error_code={}",
                    err.code()
                );
                return Err(err);
            }
        };

        let remaining_references = self.repo.count_employee_references(employee_id)?;
        if remaining_references > 0 {
            error!(
                "event=employee_delete module=service status=error error_code=partial_cascade_failure remaining={remaining_references}"
            );
            return Err(AssignmentError::PartialCascadeFailure {
                employee_id,
                remaining_references,
            });
        }

        let report = CascadeReport::from_outcome(employee_id, outcome);
        info!(
            "event=employee_delete module=service status=ok projects_touched={} tasks_touched={}",
            report.projects_touched.len(),
            report.tasks_touched.len()
        );
        Ok(report)
    }

    /// Removes the employee from one project's ledger and from tasks owned
    /// by that project. Idempotent when the employee is not referenced.
    ///
    /// # Errors
    /// - `NotFound` if the project does not exist.
    pub fn remove_employee_from_project(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> Result<CascadeReport, AssignmentError> {
        if self.repo.find_project(project_id)?.is_none() {
            return Err(AssignmentError::NotFound {
                kind: EntityKind::Project,
                id: project_id,
            });
        }

        let scope = AssignmentScope::Project(project_id);
        let targets = BTreeSet::from([employee_id]);
        let mut batch = AssignmentBatch::new();
        batch
            .push(AssignmentWrite::RemoveFromLedgers {
                scope,
                employee_ids: targets.clone(),
            })
            .push(AssignmentWrite::RemoveFromTaskAssignments {
                scope,
                employee_ids: targets,
            });

        let outcome = self.repo.apply_batch(&batch)?;
        let report = CascadeReport::from_outcome(employee_id, outcome);
        info!(
            "event=project_member_remove module=service status=ok tasks_touched={}",
            report.tasks_touched.len()
        );
        Ok(report)
    }
}
