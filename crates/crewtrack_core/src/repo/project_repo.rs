//! Project repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read APIs for projects including their manual ledger.
//! - Update descriptive fields and status without touching the ledger.
//!
//! # Invariants
//! - Ledger rows are written here only at creation time; later ledger edits
//!   go through `AssignmentRepository::apply_batch`.
//! - New projects start at `version = 1`.

use crate::db::migrations::ensure_migrated;
use crate::model::project::{Project, ProjectId};
use crate::model::EntityKind;
use crate::repo::sql_support::{
    ensure_employees_exist, load_project_ledger, parse_column, parse_uuid, replace_project_ledger,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const PROJECT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    client,
    status,
    version,
    created_at
FROM projects";

/// Query options for listing projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectListQuery {
    /// Include `done` and `cancelled` projects.
    pub include_closed: bool,
}

/// Repository interface for project records.
pub trait ProjectRepository {
    /// Persists a new project and its initial ledger.
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    /// Writes name, description, client and status.
    fn update_project_details(&self, project: &Project) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Lists projects by `created_at ASC, uuid ASC`.
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_employees_exist(&tx, &project.manual_ledger)?;
        tx.execute(
            "INSERT INTO projects (
                uuid,
                name,
                description,
                client,
                status,
                version,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6);",
            params![
                project.id.to_string(),
                project.name.as_str(),
                project.description.as_str(),
                project.client.as_str(),
                project.status.as_str(),
                project.created_at,
            ],
        )?;
        replace_project_ledger(&tx, project.id, &project.manual_ledger)?;
        tx.commit()?;

        Ok(project.id)
    }

    fn update_project_details(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;

        let changed = self.conn.execute(
            "UPDATE projects
             SET
                name = ?2,
                description = ?3,
                client = ?4,
                status = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                project.id.to_string(),
                project.name.as_str(),
                project.description.as_str(),
                project.client.as_str(),
                project.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Project, project.id));
        }
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        if !query.include_closed {
            sql.push_str(" AND status NOT IN ('done', 'cancelled')");
        }
        sql.push_str(" ORDER BY created_at ASC, uuid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(self.conn, row)?);
        }
        Ok(projects)
    }
}

pub(crate) fn load_project(conn: &Connection, id: ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(conn, row)?));
    }
    Ok(None)
}

fn parse_project_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "projects.uuid")?;
    let version: i64 = row.get("version")?;
    if version < 1 {
        return Err(RepoError::InvalidData(format!(
            "invalid version `{version}` in projects.version"
        )));
    }

    let project = Project {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        client: row.get("client")?,
        status: parse_column(row, "status")?,
        created_at: row.get("created_at")?,
        manual_ledger: load_project_ledger(conn, id)?,
        version: version as u64,
    };
    project.validate()?;
    Ok(project)
}
