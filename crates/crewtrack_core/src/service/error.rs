//! Service-level error types.
//!
//! Repository errors are folded into the variants callers branch on; anything
//! transport-shaped stays wrapped in `Repo`.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::validation::ValidationError;
use crate::model::EntityKind;
use crate::repo::RepoError;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

fn join_ids(ids: &BTreeSet<EmployeeId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error for employee/project/task CRUD use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed record validation; caller may correct and retry.
    Validation(ValidationError),
    NotFound { kind: EntityKind, id: Uuid },
    DuplicateEmail(String),
    /// Assignment ids with no employee record.
    UnknownEmployees(BTreeSet<EmployeeId>),
    /// The record changed since it was read; reload and retry.
    Conflict { kind: EntityKind, id: Uuid },
    Repo(RepoError),
    /// Write succeeded but the read-back did not find the record.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::DuplicateEmail(email) => write!(f, "email already in use: {email}"),
            Self::UnknownEmployees(ids) => write!(f, "unknown employee ids: {}", join_ids(ids)),
            Self::Conflict { kind, id } => write!(f, "{kind} {id} changed since it was read"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            RepoError::MissingEmployees(ids) => Self::UnknownEmployees(ids),
            RepoError::StaleAssignees { task_id } => Self::Conflict {
                kind: EntityKind::Task,
                id: task_id,
            },
            RepoError::VersionConflict { project_id, .. } => Self::Conflict {
                kind: EntityKind::Project,
                id: project_id,
            },
            other => Self::Repo(other),
        }
    }
}

/// Error for reconciliation and cascade operations.
#[derive(Debug)]
pub enum AssignmentError {
    NotFound {
        kind: EntityKind,
        id: Uuid,
    },
    /// Desired ids that do not name an existing employee. Nothing was written.
    ReferentialIntegrity { missing: BTreeSet<EmployeeId> },
    /// The project changed between read and write. Nothing was written; the
    /// caller should re-issue the whole operation.
    ConcurrentModification {
        project_id: ProjectId,
        expected: u64,
        actual: u64,
    },
    /// The employee is gone but references to it survived. Fatal for the
    /// caller until the cascade is re-run.
    PartialCascadeFailure {
        employee_id: EmployeeId,
        remaining_references: usize,
    },
    Repo(RepoError),
}

impl AssignmentError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::PartialCascadeFailure { .. } => "partial_cascade_failure",
            Self::Repo(_) => "store_failure",
        }
    }
}

impl Display for AssignmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::ReferentialIntegrity { missing } => {
                write!(f, "unknown employee ids: {}", join_ids(missing))
            }
            Self::ConcurrentModification {
                project_id,
                expected,
                actual,
            } => write!(
                f,
                "project {project_id} was modified concurrently (expected version {expected}, found {actual})"
            ),
            Self::PartialCascadeFailure {
                employee_id,
                remaining_references,
            } => write!(
                f,
                "employee {employee_id} removal left {remaining_references} dangling references"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssignmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssignmentError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::MissingEmployees(missing) => Self::ReferentialIntegrity { missing },
            RepoError::VersionConflict {
                project_id,
                expected,
                actual,
            } => Self::ConcurrentModification {
                project_id,
                expected,
                actual,
            },
            other => Self::Repo(other),
        }
    }
}
