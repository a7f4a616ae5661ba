//! Project assignment reconciliation.
//!
//! # Responsibility
//! - Compute a project's effective assignment set (manual ledger plus every
//!   task's assignees).
//! - Turn an edited effective set into the minimal ledger/task mutation and
//!   apply it as one batch.
//!
//! # Invariants
//! - Removals cascade to every task owned by the project; additions only ever
//!   land on the manual ledger.
//! - After a successful apply, the recomputed effective set equals the
//!   desired set.
//! - Desired ids are checked against employee records before anything is
//!   written, and the ledger write carries the project version read during
//!   planning.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::task::Task;
use crate::model::EntityKind;
use crate::repo::assignment_repo::{
    AssignmentBatch, AssignmentRepository, AssignmentScope, AssignmentWrite, BatchOutcome,
};
use crate::service::error::AssignmentError;
use log::{info, warn};
use std::collections::BTreeSet;

/// Manual ledger united with the assignees of every given task.
pub fn effective_set<'a, I>(ledger: &BTreeSet<EmployeeId>, tasks: I) -> BTreeSet<EmployeeId>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut effective = ledger.clone();
    for task in tasks {
        effective.extend(task.assignees.iter().copied());
    }
    effective
}

/// Minimal change turning the current assignment state into a desired
/// effective set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileDiff {
    /// Ids that must disappear from the ledger and from every project task.
    pub to_remove: BTreeSet<EmployeeId>,
    /// Desired ids not yet on the manual ledger.
    pub to_add_to_manual: BTreeSet<EmployeeId>,
    /// Ledger to store after the change.
    pub new_manual: BTreeSet<EmployeeId>,
}

impl ReconcileDiff {
    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add_to_manual.is_empty()
    }
}

/// Computes the reconciliation diff. Pure.
///
/// Submitting the current effective set unchanged is a no-op: task-derived
/// ids are only claimed onto the ledger when the desired set differs.
pub fn reconcile(
    current_manual: &BTreeSet<EmployeeId>,
    current_tasks: &[Task],
    desired: &BTreeSet<EmployeeId>,
) -> ReconcileDiff {
    let old_effective = effective_set(current_manual, current_tasks);
    if old_effective == *desired {
        return ReconcileDiff {
            new_manual: current_manual.clone(),
            ..ReconcileDiff::default()
        };
    }

    let to_remove: BTreeSet<EmployeeId> = old_effective.difference(desired).copied().collect();
    let to_add_to_manual: BTreeSet<EmployeeId> =
        desired.difference(current_manual).copied().collect();
    let new_manual = current_manual
        .difference(&to_remove)
        .chain(to_add_to_manual.iter())
        .copied()
        .collect();

    ReconcileDiff {
        to_remove,
        to_add_to_manual,
        new_manual,
    }
}

/// Diff bound to the project state it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub project_id: ProjectId,
    /// Project version observed while planning.
    pub base_version: u64,
    pub diff: ReconcileDiff,
}

impl ReconcilePlan {
    /// Primitive writes for this plan. The ledger write goes first so a
    /// version conflict aborts before any task is touched.
    pub fn to_batch(&self) -> AssignmentBatch {
        let mut batch = AssignmentBatch::new();
        batch.push(AssignmentWrite::SetProjectLedger {
            project_id: self.project_id,
            expected_version: self.base_version,
            ledger: self.diff.new_manual.clone(),
        });
        if !self.diff.to_remove.is_empty() {
            batch.push(AssignmentWrite::RemoveFromTaskAssignments {
                scope: AssignmentScope::Project(self.project_id),
                employee_ids: self.diff.to_remove.clone(),
            });
        }
        batch
    }
}

/// Reconciliation engine over an assignment store.
pub struct RelationReconciler<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> RelationReconciler<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Effective assignment set of a stored project.
    pub fn effective_set(
        &self,
        project_id: ProjectId,
    ) -> Result<BTreeSet<EmployeeId>, AssignmentError> {
        let project = self
            .repo
            .find_project(project_id)?
            .ok_or(AssignmentError::NotFound {
                kind: EntityKind::Project,
                id: project_id,
            })?;
        let tasks = self.repo.find_tasks_by_project(project_id)?;
        Ok(effective_set(&project.manual_ledger, &tasks))
    }

    /// Reads current state and computes a plan reaching `desired`.
    ///
    /// # Errors
    /// - `NotFound` if the project does not exist.
    /// - `ReferentialIntegrity` if any desired id has no employee record.
    pub fn prepare(
        &self,
        project_id: ProjectId,
        desired: &BTreeSet<EmployeeId>,
    ) -> Result<ReconcilePlan, AssignmentError> {
        let project = self
            .repo
            .find_project(project_id)?
            .ok_or(AssignmentError::NotFound {
                kind: EntityKind::Project,
                id: project_id,
            })?;

        let missing = self.repo.unknown_employee_ids(desired)?;
        if !missing.is_empty() {
            return Err(AssignmentError::ReferentialIntegrity { missing });
        }

        let tasks = self.repo.find_tasks_by_project(project_id)?;
        Ok(ReconcilePlan {
            project_id,
            base_version: project.version,
            diff: reconcile(&project.manual_ledger, &tasks, desired),
        })
    }

    /// Applies a plan atomically. No-op plans are not written.
    ///
    /// # Errors
    /// - `ConcurrentModification` if the project moved past `base_version`.
    /// - `ReferentialIntegrity` if a ledger id lost its employee meanwhile.
    pub fn apply(&self, plan: &ReconcilePlan) -> Result<BatchOutcome, AssignmentError> {
        if plan.diff.is_noop() {
            return Ok(BatchOutcome::default());
        }
        Ok(self.repo.apply_batch(&plan.to_batch())?)
    }

    /// Plans and applies in one call.
    pub fn reconcile_project_assignment(
        &self,
        project_id: ProjectId,
        desired: &BTreeSet<EmployeeId>,
    ) -> Result<ReconcileDiff, AssignmentError> {
        let result = self
            .prepare(project_id, desired)
            .and_then(|plan| self.apply(&plan).map(|outcome| (plan, outcome)));

        match result {
            Ok((plan, outcome)) => {
                info!(
                    "event=reconcile_project module=service status=ok removed={} added={} tasks_touched={}",
                    plan.diff.to_remove.len(),
                    plan.diff.to_add_to_manual.len(),
                    outcome.tasks_touched.len()
                );
                Ok(plan.diff)
            }
            Err(err) => {
                warn!(
                    "event=reconcile_project module=service status=error error_code={}",
                    err.code()
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{effective_set, reconcile, ReconcileDiff, ReconcilePlan};
    use crate::model::task::Task;
    use crate::repo::assignment_repo::{AssignmentScope, AssignmentWrite};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn task_with(project_id: Uuid, assignees: &[Uuid]) -> Task {
        let mut task = Task::new(project_id, "task");
        task.assignees = assignees.iter().copied().collect();
        task
    }

    fn ids(values: &[Uuid]) -> BTreeSet<Uuid> {
        values.iter().copied().collect()
    }

    #[test]
    fn effective_set_unions_without_duplicates() {
        let project_id = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![task_with(project_id, &[a, b]), task_with(project_id, &[b, c])];

        let forward = effective_set(&ids(&[a]), &tasks);
        let reversed = effective_set(&ids(&[a]), tasks.iter().rev());
        assert_eq!(forward, ids(&[a, b, c]));
        assert_eq!(forward, reversed);
    }

    #[test]
    fn concrete_scenario_removes_b_and_claims_c_and_d() {
        let project_id = Uuid::new_v4();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let manual = ids(&[a, b]);
        let tasks = vec![task_with(project_id, &[b, c]), task_with(project_id, &[d])];
        assert_eq!(effective_set(&manual, &tasks), ids(&[a, b, c, d]));

        let diff = reconcile(&manual, &tasks, &ids(&[a, c, d]));
        assert_eq!(
            diff,
            ReconcileDiff {
                to_remove: ids(&[b]),
                to_add_to_manual: ids(&[c, d]),
                new_manual: ids(&[a, c, d]),
            }
        );
    }

    #[test]
    fn desired_equal_to_effective_is_noop() {
        let project_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let manual = ids(&[a]);
        let tasks = vec![task_with(project_id, &[b])];

        let diff = reconcile(&manual, &tasks, &ids(&[a, b]));
        assert!(diff.is_noop());
        assert!(diff.to_remove.is_empty());
        assert!(diff.to_add_to_manual.is_empty());
        assert_eq!(diff.new_manual, manual);
    }

    #[test]
    fn shrinking_claims_surviving_task_derived_ids() {
        let project_id = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![task_with(project_id, &[b, c])];

        let diff = reconcile(&ids(&[a]), &tasks, &ids(&[b, c]));
        assert_eq!(diff.to_remove, ids(&[a]));
        assert_eq!(diff.to_add_to_manual, ids(&[b, c]));
        assert_eq!(diff.new_manual, ids(&[b, c]));
    }

    #[test]
    fn empty_desired_clears_everything() {
        let project_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![task_with(project_id, &[b])];

        let diff = reconcile(&ids(&[a]), &tasks, &BTreeSet::new());
        assert_eq!(diff.to_remove, ids(&[a, b]));
        assert!(diff.to_add_to_manual.is_empty());
        assert!(diff.new_manual.is_empty());
    }

    #[test]
    fn plan_batch_checks_version_before_task_removal() {
        let project_id = Uuid::new_v4();
        let b = Uuid::new_v4();
        let plan = ReconcilePlan {
            project_id,
            base_version: 4,
            diff: ReconcileDiff {
                to_remove: ids(&[b]),
                to_add_to_manual: BTreeSet::new(),
                new_manual: BTreeSet::new(),
            },
        };

        let batch = plan.to_batch();
        assert_eq!(
            batch.writes(),
            &[
                AssignmentWrite::SetProjectLedger {
                    project_id,
                    expected_version: 4,
                    ledger: BTreeSet::new(),
                },
                AssignmentWrite::RemoveFromTaskAssignments {
                    scope: AssignmentScope::Project(project_id),
                    employee_ids: ids(&[b]),
                },
            ]
        );
    }
}
