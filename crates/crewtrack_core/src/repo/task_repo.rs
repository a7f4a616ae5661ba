//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/read APIs over `tasks` and `task_assignments`.
//! - Keep the owning project's concurrency stamp in step with task-side
//!   assignment changes.
//!
//! # Invariants
//! - A task's owning project must exist.
//! - Assignee ids must reference existing employees.
//! - Any write that changes a task's assignees or owner bumps the version of
//!   every affected project, so stale reconciliation reads are detectable.
//! - A task update only replaces assignees the caller actually edited, and
//!   only if nobody changed them since the caller's read.
//! - Status and hour writes touch single columns and never `task_assignments`.

use crate::db::migrations::ensure_migrated;
use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::status::TaskStatus;
use crate::model::task::{Task, TaskId};
use crate::model::validation::require_hour_entry;
use crate::model::EntityKind;
use crate::repo::sql_support::{
    bump_project_versions, ensure_employees_exist, load_task_assignees, parse_column, parse_uuid,
    project_version, replace_task_assignees,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    project_uuid,
    name,
    estimated_hours,
    logged_hours,
    status,
    created_at
FROM tasks";

/// Query options for listing tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// Restrict to one owning project.
    pub project_id: Option<ProjectId>,
    /// Include tasks in `deleted` status.
    pub include_deleted: bool,
}

/// Repository interface for task records.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    /// Replaces name, estimate, status and owner, and the assignees when the
    /// caller edited them.
    ///
    /// `read_assignees` is the assignee set the caller loaded. If
    /// `task.assignees` equals it, the committed assignments are left as they
    /// are. Otherwise the committed set must still equal `read_assignees`, or
    /// `StaleAssignees` is returned and nothing is written. `logged_hours` is
    /// never written here; use [`TaskRepository::add_logged_hours`].
    fn update_task(&self, task: &Task, read_assignees: &BTreeSet<EmployeeId>) -> RepoResult<()>;
    /// Writes the status column only.
    fn set_task_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()>;
    /// Adds a strictly positive entry to `logged_hours` in place.
    fn add_logged_hours(&self, id: TaskId, hours: f64) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists tasks by `created_at ASC, uuid ASC`.
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_project_exists(&tx, task.project_id)?;
        ensure_employees_exist(&tx, &task.assignees)?;

        let task_uuid = task.id.to_string();
        tx.execute(
            "INSERT INTO tasks (
                uuid,
                project_uuid,
                name,
                estimated_hours,
                logged_hours,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task_uuid.as_str(),
                task.project_id.to_string(),
                task.name.as_str(),
                task.estimated_hours,
                task.logged_hours,
                task.status.as_str(),
                task.created_at,
            ],
        )?;
        replace_task_assignees(&tx, &task_uuid, &task.assignees)?;
        if !task.assignees.is_empty() {
            bump_project_versions(&tx, [&task.project_id])?;
        }
        tx.commit()?;

        Ok(task.id)
    }

    fn update_task(&self, task: &Task, read_assignees: &BTreeSet<EmployeeId>) -> RepoResult<()> {
        task.validate()?;

        let task_uuid = task.id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let previous_owner = current_owner(&tx, &task_uuid)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Task, task.id))?;
        ensure_project_exists(&tx, task.project_id)?;

        let committed = load_task_assignees(&tx, &task_uuid)?;
        let reassigning = task.assignees != *read_assignees;
        if reassigning {
            if committed != *read_assignees {
                return Err(RepoError::StaleAssignees { task_id: task.id });
            }
            ensure_employees_exist(&tx, &task.assignees)?;
        }

        tx.execute(
            "UPDATE tasks
             SET
                project_uuid = ?2,
                name = ?3,
                estimated_hours = ?4,
                status = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                task_uuid.as_str(),
                task.project_id.to_string(),
                task.name.as_str(),
                task.estimated_hours,
                task.status.as_str(),
            ],
        )?;

        let assignees_changed = reassigning && committed != task.assignees;
        if assignees_changed {
            replace_task_assignees(&tx, &task_uuid, &task.assignees)?;
        }
        if assignees_changed || previous_owner != task.project_id {
            let affected: BTreeSet<ProjectId> = [previous_owner, task.project_id].into();
            bump_project_versions(&tx, &affected)?;
        }
        tx.commit()?;

        Ok(())
    }

    fn set_task_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, id));
        }
        Ok(())
    }

    fn add_logged_hours(&self, id: TaskId, hours: f64) -> RepoResult<()> {
        require_hour_entry(hours)?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET logged_hours = logged_hours + ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), hours],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(project_id) = query.project_id {
            sql.push_str(" AND project_uuid = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }
        if !query.include_deleted {
            sql.push_str(" AND status <> 'deleted'");
        }
        sql.push_str(" ORDER BY created_at ASC, uuid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(self.conn, row)?);
        }
        Ok(tasks)
    }
}

/// Loads every task owned by `project_id`, soft-deleted ones included.
pub(crate) fn load_tasks_by_project(
    conn: &Connection,
    project_id: ProjectId,
) -> RepoResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL} WHERE project_uuid = ?1 ORDER BY created_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(conn, row)?);
    }
    Ok(tasks)
}

fn ensure_project_exists(conn: &Connection, project_id: ProjectId) -> RepoResult<()> {
    if project_version(conn, project_id)?.is_none() {
        return Err(RepoError::not_found(EntityKind::Project, project_id));
    }
    Ok(())
}

fn current_owner(conn: &Connection, task_uuid: &str) -> RepoResult<Option<ProjectId>> {
    let mut stmt = conn.prepare("SELECT project_uuid FROM tasks WHERE uuid = ?1;")?;
    let mut rows = stmt.query([task_uuid])?;
    match rows.next()? {
        Some(row) => {
            let value: String = row.get(0)?;
            Ok(Some(parse_uuid(&value, "tasks.project_uuid")?))
        }
        None => Ok(None),
    }
}

fn parse_task_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let project_text: String = row.get("project_uuid")?;

    let task = Task {
        id: parse_uuid(&uuid_text, "tasks.uuid")?,
        project_id: parse_uuid(&project_text, "tasks.project_uuid")?,
        name: row.get("name")?,
        estimated_hours: row.get("estimated_hours")?,
        logged_hours: row.get("logged_hours")?,
        assignees: load_task_assignees(conn, &uuid_text)?,
        status: parse_column(row, "status")?,
        created_at: row.get("created_at")?,
    };
    task.validate()?;
    Ok(task)
}
