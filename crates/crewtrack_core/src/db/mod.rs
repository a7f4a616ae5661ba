//! SQLite backend for the assignment store.
//!
//! Connections handed to repositories come from [`open_db`] or
//! [`open_db_in_memory`], which enable foreign keys and migrate the schema
//! before returning. Repositories re-check the schema version through
//! [`migrations::ensure_migrated`] so a raw `Connection` is refused early.
//!
//! Foreign keys are what keep `project_assignments` and `task_assignments` rows
//! from outliving the employee, project or task they point at.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures raised while opening or migrating the store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file carries a schema written by a newer crewtrack build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A migration script was rejected; nothing from the run was kept.
    MigrationFailed {
        version: u32,
        source: rusqlite::Error,
    },
    /// Connection did not go through `open_db*`.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema v{db_version} is newer than this build (max v{latest_supported})"
            ),
            Self::MigrationFailed { version, source } => {
                write!(f, "migration to schema v{version} failed: {source}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection is at schema v{actual_version}, repositories need v{expected_version}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
