//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-entity data access contracts plus the assignment contract
//!   consumed by the reconciliation engine.
//! - Isolate SQLite and flat-file details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before persistence.
//! - Every id written to a project ledger or task assignment list references
//!   an existing employee at commit time.
//! - Repository APIs return semantic errors (`NotFound`, `VersionConflict`,
//!   `StaleAssignees`, `MissingEmployees`) in addition to transport errors.
//! - Task progress writes (status, hours) never touch assignments.

pub mod assignment_repo;
pub mod employee_repo;
pub mod json_store;
pub mod project_repo;
mod sql_support;
pub mod task_repo;

use crate::db::DbError;
use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::task::TaskId;
use crate::model::validation::ValidationError;
use crate::model::EntityKind;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every backend.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    NotFound {
        kind: EntityKind,
        id: Uuid,
    },
    /// Another employee already uses this email (case-insensitive).
    DuplicateEmail(String),
    /// Referenced employee ids that do not exist at write time.
    MissingEmployees(BTreeSet<EmployeeId>),
    /// Project changed since the caller read it.
    VersionConflict {
        project_id: ProjectId,
        expected: u64,
        actual: u64,
    },
    /// Task assignees changed since the caller read them.
    StaleAssignees { task_id: TaskId },
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "store file error: {err}"),
            Self::Json(err) => write!(f, "store file is not valid json: {err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::DuplicateEmail(email) => write!(f, "email already in use: {email}"),
            Self::MissingEmployees(ids) => write!(
                f,
                "unknown employee ids: {}",
                ids.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::VersionConflict {
                project_id,
                expected,
                actual,
            } => write!(
                f,
                "project {project_id} changed concurrently: expected version {expected}, found {actual}"
            ),
            Self::StaleAssignees { task_id } => write!(
                f,
                "task {task_id} assignees changed since they were read"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
