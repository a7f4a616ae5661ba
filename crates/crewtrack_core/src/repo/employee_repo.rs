//! Employee repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/read APIs over the `employees` table.
//! - Enforce case-insensitive email uniqueness with a semantic error.
//!
//! # Invariants
//! - There is no standalone hard delete here. Removing an employee is only
//!   possible through an assignment batch, which cascades references first.

use crate::db::migrations::ensure_migrated;
use crate::model::employee::{Employee, EmployeeId};
use crate::model::EntityKind;
use crate::repo::sql_support::{
    bool_to_int, missing_employee_ids, parse_column, parse_flag, parse_uuid,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    specialty,
    area,
    role,
    skills_json,
    is_active,
    created_at
FROM employees";

/// Repository interface for employee records.
pub trait EmployeeRepository {
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId>;
    fn update_employee(&self, employee: &Employee) -> RepoResult<()>;
    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
    /// Lists employees by `created_at ASC, uuid ASC`.
    fn list_employees(&self) -> RepoResult<Vec<Employee>>;
    /// Returns the subset of `ids` with no employee record.
    fn missing_employee_ids(&self, ids: &BTreeSet<EmployeeId>)
        -> RepoResult<BTreeSet<EmployeeId>>;
}

/// SQLite-backed employee repository.
pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId> {
        employee.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_email_available(&tx, employee)?;
        tx.execute(
            "INSERT INTO employees (
                uuid,
                name,
                email,
                specialty,
                area,
                role,
                skills_json,
                is_active,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                employee.id.to_string(),
                employee.name.as_str(),
                employee.email.as_str(),
                employee.specialty.as_str(),
                employee.area.as_str(),
                employee.role.as_str(),
                serde_json::to_string(&employee.skills)?,
                bool_to_int(employee.is_active),
                employee.created_at,
            ],
        )?;
        tx.commit()?;

        Ok(employee.id)
    }

    fn update_employee(&self, employee: &Employee) -> RepoResult<()> {
        employee.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_email_available(&tx, employee)?;
        let changed = tx.execute(
            "UPDATE employees
             SET
                name = ?2,
                email = ?3,
                specialty = ?4,
                area = ?5,
                role = ?6,
                skills_json = ?7,
                is_active = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                employee.id.to_string(),
                employee.name.as_str(),
                employee.email.as_str(),
                employee.specialty.as_str(),
                employee.area.as_str(),
                employee.role.as_str(),
                serde_json::to_string(&employee.skills)?,
                bool_to_int(employee.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Employee, employee.id));
        }
        tx.commit()?;

        Ok(())
    }

    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        load_employee(self.conn, id)
    }

    fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL} ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut employees = Vec::new();
        while let Some(row) = rows.next()? {
            employees.push(parse_employee_row(row)?);
        }
        Ok(employees)
    }

    fn missing_employee_ids(
        &self,
        ids: &BTreeSet<EmployeeId>,
    ) -> RepoResult<BTreeSet<EmployeeId>> {
        missing_employee_ids(self.conn, ids)
    }
}

pub(crate) fn load_employee(conn: &Connection, id: EmployeeId) -> RepoResult<Option<Employee>> {
    let mut stmt = conn.prepare(&format!("{EMPLOYEE_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_employee_row(row)?));
    }
    Ok(None)
}

fn ensure_email_available(conn: &Connection, employee: &Employee) -> RepoResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM employees
            WHERE email = ?1 COLLATE NOCASE
              AND uuid <> ?2
        );",
        params![employee.email.as_str(), employee.id.to_string()],
        |row| row.get(0),
    )?;
    if taken == 1 {
        return Err(RepoError::DuplicateEmail(employee.email.clone()));
    }
    Ok(())
}

fn parse_employee_row(row: &Row<'_>) -> RepoResult<Employee> {
    let uuid_text: String = row.get("uuid")?;
    let skills_text: String = row.get("skills_json")?;
    let skills: Vec<String> = serde_json::from_str(&skills_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid skills list `{skills_text}` in employees.skills_json"
        ))
    })?;

    let employee = Employee {
        id: parse_uuid(&uuid_text, "employees.uuid")?,
        name: row.get("name")?,
        email: row.get("email")?,
        specialty: row.get("specialty")?,
        area: parse_column(row, "area")?,
        role: parse_column(row, "role")?,
        skills,
        is_active: parse_flag(row.get("is_active")?, "employees.is_active")?,
        created_at: row.get("created_at")?,
    };
    employee.validate()?;
    Ok(employee)
}
