//! Shared SQLite helpers for the entity repositories.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_column<T: FromStr>(row: &Row<'_>, column: &'static str) -> RepoResult<T> {
    let text: String = row.get(column)?;
    text.parse::<T>()
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{text}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Runs a single-parameter query returning one uuid column per row.
pub(crate) fn load_id_set(
    conn: &Connection,
    sql: &str,
    key: &str,
    column: &'static str,
) -> RepoResult<BTreeSet<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.insert(parse_uuid(&value, column)?);
    }
    Ok(ids)
}

pub(crate) fn load_project_ledger(
    conn: &Connection,
    project_id: ProjectId,
) -> RepoResult<BTreeSet<EmployeeId>> {
    load_id_set(
        conn,
        "SELECT employee_uuid
         FROM project_assignments
         WHERE project_uuid = ?1;",
        &project_id.to_string(),
        "project_assignments.employee_uuid",
    )
}

pub(crate) fn load_task_assignees(
    conn: &Connection,
    task_uuid: &str,
) -> RepoResult<BTreeSet<EmployeeId>> {
    load_id_set(
        conn,
        "SELECT employee_uuid
         FROM task_assignments
         WHERE task_uuid = ?1;",
        task_uuid,
        "task_assignments.employee_uuid",
    )
}

pub(crate) fn missing_employee_ids(
    conn: &Connection,
    ids: &BTreeSet<EmployeeId>,
) -> RepoResult<BTreeSet<EmployeeId>> {
    let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM employees WHERE uuid = ?1);")?;
    let mut missing = BTreeSet::new();
    for id in ids {
        let exists: i64 = stmt.query_row([id.to_string()], |row| row.get(0))?;
        if exists == 0 {
            missing.insert(*id);
        }
    }
    Ok(missing)
}

pub(crate) fn ensure_employees_exist(
    conn: &Connection,
    ids: &BTreeSet<EmployeeId>,
) -> RepoResult<()> {
    let missing = missing_employee_ids(conn, ids)?;
    if !missing.is_empty() {
        return Err(RepoError::MissingEmployees(missing));
    }
    Ok(())
}

pub(crate) fn project_version(conn: &Connection, project_id: ProjectId) -> RepoResult<Option<u64>> {
    let mut stmt = conn.prepare("SELECT version FROM projects WHERE uuid = ?1;")?;
    let mut rows = stmt.query([project_id.to_string()])?;
    match rows.next()? {
        Some(row) => {
            let version: i64 = row.get(0)?;
            Ok(Some(version as u64))
        }
        None => Ok(None),
    }
}

/// Moves each project's concurrency stamp forward by one.
pub(crate) fn bump_project_versions<'a>(
    conn: &Connection,
    project_ids: impl IntoIterator<Item = &'a ProjectId>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "UPDATE projects
         SET version = version + 1,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1;",
    )?;
    for project_id in project_ids {
        stmt.execute(params![project_id.to_string()])?;
    }
    Ok(())
}

pub(crate) fn replace_task_assignees(
    conn: &Connection,
    task_uuid: &str,
    assignees: &BTreeSet<EmployeeId>,
) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM task_assignments WHERE task_uuid = ?1;",
        [task_uuid],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO task_assignments (task_uuid, employee_uuid) VALUES (?1, ?2);",
    )?;
    for employee_id in assignees {
        stmt.execute(params![task_uuid, employee_id.to_string()])?;
    }
    Ok(())
}

pub(crate) fn replace_project_ledger(
    conn: &Connection,
    project_id: ProjectId,
    ledger: &BTreeSet<EmployeeId>,
) -> RepoResult<()> {
    let project_uuid = project_id.to_string();
    conn.execute(
        "DELETE FROM project_assignments WHERE project_uuid = ?1;",
        [project_uuid.as_str()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO project_assignments (project_uuid, employee_uuid) VALUES (?1, ?2);",
    )?;
    for employee_id in ledger {
        stmt.execute(params![project_uuid.as_str(), employee_id.to_string()])?;
    }
    Ok(())
}
