//! Assignment store contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose the narrow read/write surface the reconciliation engine needs:
//!   point reads, ledger replacement, bulk assignment removal and employee
//!   hard delete.
//! - Apply an `AssignmentBatch` as one all-or-nothing unit.
//!
//! # Invariants
//! - Writes in a batch run in order inside one `IMMEDIATE` transaction.
//! - `SetProjectLedger` fails with `VersionConflict` unless the project is
//!   still at `expected_version` when the batch starts writing.
//! - Every project whose ledger or task assignments changed gets exactly one
//!   version bump per committed batch.
//! - Storage holds no reconciliation rules; it only executes primitive writes.

use crate::db::migrations::ensure_migrated;
use crate::model::employee::{Employee, EmployeeId};
use crate::model::project::{Project, ProjectId};
use crate::model::task::{Task, TaskId};
use crate::model::EntityKind;
use crate::repo::employee_repo::load_employee;
use crate::repo::project_repo::load_project;
use crate::repo::sql_support::{
    bump_project_versions, ensure_employees_exist, load_project_ledger, missing_employee_ids,
    parse_uuid, project_version, replace_project_ledger,
};
use crate::repo::task_repo::load_tasks_by_project;
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

/// Which records a removal write applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentScope {
    /// Only the named project's ledger, or only tasks owned by it.
    Project(ProjectId),
    /// Every project ledger, or every task.
    Global,
}

impl AssignmentScope {
    pub fn covers(self, project_id: ProjectId) -> bool {
        match self {
            Self::Project(scoped) => scoped == project_id,
            Self::Global => true,
        }
    }
}

/// One primitive write understood by every storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentWrite {
    /// Replaces a project's manual ledger if its version still matches.
    SetProjectLedger {
        project_id: ProjectId,
        expected_version: u64,
        ledger: BTreeSet<EmployeeId>,
    },
    /// Removes ids from project manual ledgers.
    RemoveFromLedgers {
        scope: AssignmentScope,
        employee_ids: BTreeSet<EmployeeId>,
    },
    /// Removes ids from task assignment lists.
    RemoveFromTaskAssignments {
        scope: AssignmentScope,
        employee_ids: BTreeSet<EmployeeId>,
    },
    /// Hard-deletes an employee record.
    DeleteEmployee { employee_id: EmployeeId },
}

/// Ordered list of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentBatch {
    writes: Vec<AssignmentWrite>,
}

impl AssignmentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: AssignmentWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn writes(&self) -> &[AssignmentWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// What a committed batch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Projects whose ledger or task assignments changed (version bumped).
    pub projects_touched: BTreeSet<ProjectId>,
    /// Tasks whose assignment list changed.
    pub tasks_touched: BTreeSet<TaskId>,
    /// Employee removed by a `DeleteEmployee` write.
    pub employee_deleted: Option<EmployeeId>,
}

/// Store surface consumed by the reconciliation engine.
pub trait AssignmentRepository {
    fn find_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Every task owned by the project, soft-deleted ones included.
    fn find_tasks_by_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>>;
    fn find_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
    /// Returns the subset of `ids` with no employee record.
    fn unknown_employee_ids(&self, ids: &BTreeSet<EmployeeId>)
        -> RepoResult<BTreeSet<EmployeeId>>;
    /// Counts ledger entries plus task assignments referencing the employee.
    fn count_employee_references(&self, employee_id: EmployeeId) -> RepoResult<usize>;
    /// Applies every write or none of them.
    fn apply_batch(&self, batch: &AssignmentBatch) -> RepoResult<BatchOutcome>;
}

/// SQLite-backed assignment store.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn find_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn find_tasks_by_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>> {
        load_tasks_by_project(self.conn, project_id)
    }

    fn find_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        load_employee(self.conn, id)
    }

    fn unknown_employee_ids(
        &self,
        ids: &BTreeSet<EmployeeId>,
    ) -> RepoResult<BTreeSet<EmployeeId>> {
        missing_employee_ids(self.conn, ids)
    }

    fn count_employee_references(&self, employee_id: EmployeeId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM project_assignments WHERE employee_uuid = ?1)
              + (SELECT COUNT(*) FROM task_assignments WHERE employee_uuid = ?1);",
            [employee_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn apply_batch(&self, batch: &AssignmentBatch) -> RepoResult<BatchOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut outcome = BatchOutcome::default();

        for write in batch.writes() {
            match write {
                AssignmentWrite::SetProjectLedger {
                    project_id,
                    expected_version,
                    ledger,
                } => set_project_ledger(&tx, *project_id, *expected_version, ledger, &mut outcome)?,
                AssignmentWrite::RemoveFromLedgers {
                    scope,
                    employee_ids,
                } => remove_from_ledgers(&tx, *scope, employee_ids, &mut outcome)?,
                AssignmentWrite::RemoveFromTaskAssignments {
                    scope,
                    employee_ids,
                } => remove_from_tasks(&tx, *scope, employee_ids, &mut outcome)?,
                AssignmentWrite::DeleteEmployee { employee_id } => {
                    let changed = tx.execute(
                        "DELETE FROM employees WHERE uuid = ?1;",
                        [employee_id.to_string()],
                    )?;
                    if changed == 0 {
                        return Err(RepoError::not_found(EntityKind::Employee, *employee_id));
                    }
                    outcome.employee_deleted = Some(*employee_id);
                }
            }
        }

        bump_project_versions(&tx, &outcome.projects_touched)?;
        tx.commit()?;

        debug!(
            "event=assignment_batch module=repo backend=sqlite status=ok writes={} projects={} tasks={}",
            batch.writes().len(),
            outcome.projects_touched.len(),
            outcome.tasks_touched.len()
        );
        Ok(outcome)
    }
}

fn set_project_ledger(
    conn: &Connection,
    project_id: ProjectId,
    expected_version: u64,
    ledger: &BTreeSet<EmployeeId>,
    outcome: &mut BatchOutcome,
) -> RepoResult<()> {
    let actual = project_version(conn, project_id)?
        .ok_or_else(|| RepoError::not_found(EntityKind::Project, project_id))?;
    if actual != expected_version {
        return Err(RepoError::VersionConflict {
            project_id,
            expected: expected_version,
            actual,
        });
    }
    ensure_employees_exist(conn, ledger)?;

    if load_project_ledger(conn, project_id)? != *ledger {
        replace_project_ledger(conn, project_id, ledger)?;
        outcome.projects_touched.insert(project_id);
    }
    Ok(())
}

fn remove_from_ledgers(
    conn: &Connection,
    scope: AssignmentScope,
    employee_ids: &BTreeSet<EmployeeId>,
    outcome: &mut BatchOutcome,
) -> RepoResult<()> {
    let mut select = conn.prepare(
        "SELECT project_uuid
         FROM project_assignments
         WHERE employee_uuid = ?1;",
    )?;
    let mut delete = conn.prepare(
        "DELETE FROM project_assignments
         WHERE employee_uuid = ?1
           AND project_uuid = ?2;",
    )?;

    for employee_id in employee_ids {
        let employee_uuid = employee_id.to_string();
        let mut rows = select.query([employee_uuid.as_str()])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            projects.push(parse_uuid(&value, "project_assignments.project_uuid")?);
        }

        for project_id in projects.into_iter().filter(|id| scope.covers(*id)) {
            delete.execute(params![employee_uuid.as_str(), project_id.to_string()])?;
            outcome.projects_touched.insert(project_id);
        }
    }
    Ok(())
}

fn remove_from_tasks(
    conn: &Connection,
    scope: AssignmentScope,
    employee_ids: &BTreeSet<EmployeeId>,
    outcome: &mut BatchOutcome,
) -> RepoResult<()> {
    let mut select = conn.prepare(
        "SELECT ta.task_uuid, t.project_uuid
         FROM task_assignments ta
         INNER JOIN tasks t ON t.uuid = ta.task_uuid
         WHERE ta.employee_uuid = ?1;",
    )?;
    let mut delete = conn.prepare(
        "DELETE FROM task_assignments
         WHERE employee_uuid = ?1
           AND task_uuid = ?2;",
    )?;

    for employee_id in employee_ids {
        let employee_uuid = employee_id.to_string();
        let mut rows = select.query([employee_uuid.as_str()])?;
        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let task_text: String = row.get(0)?;
            let project_text: String = row.get(1)?;
            hits.push((
                parse_uuid(&task_text, "task_assignments.task_uuid")?,
                parse_uuid(&project_text, "tasks.project_uuid")?,
            ));
        }

        for (task_id, project_id) in hits {
            if !scope.covers(project_id) {
                continue;
            }
            delete.execute(params![employee_uuid.as_str(), task_id.to_string()])?;
            outcome.tasks_touched.insert(task_id);
            outcome.projects_touched.insert(project_id);
        }
    }
    Ok(())
}
