//! Runtime configuration resolved from environment variables.
//!
//! | Variable              | Meaning                           | Default              |
//! |-----------------------|-----------------------------------|----------------------|
//! | `CREWTRACK_STORE`     | `sqlite` or `json`                | `sqlite`             |
//! | `CREWTRACK_DB_PATH`   | SQLite database file              | `crewtrack.db`       |
//! | `CREWTRACK_JSON_DIR`  | directory holding `crewtrack.json`| `crewtrack-data`     |
//! | `CREWTRACK_LOG_LEVEL` | trace/debug/info/warn/error       | build-mode default   |
//! | `CREWTRACK_LOG_DIR`   | absolute log directory            | unset: no file logs  |

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_STORE: &str = "CREWTRACK_STORE";
pub const ENV_DB_PATH: &str = "CREWTRACK_DB_PATH";
pub const ENV_JSON_DIR: &str = "CREWTRACK_JSON_DIR";
pub const ENV_LOG_LEVEL: &str = "CREWTRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CREWTRACK_LOG_DIR";

const DEFAULT_DB_PATH: &str = "crewtrack.db";
const DEFAULT_JSON_DIR: &str = "crewtrack-data";

/// Which entity store backs the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite { db_path: PathBuf },
    Json { dir: PathBuf },
}

/// Value of `CREWTRACK_STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Json,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_STORE,
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {}

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub storage: StorageBackend,
    pub log_level: String,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let kind = match read(ENV_STORE) {
            Some(value) => value.parse::<StoreKind>()?,
            None => StoreKind::Sqlite,
        };
        let storage = match kind {
            StoreKind::Sqlite => StorageBackend::Sqlite {
                db_path: PathBuf::from(
                    read(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                ),
            },
            StoreKind::Json => StorageBackend::Json {
                dir: PathBuf::from(
                    read(ENV_JSON_DIR).unwrap_or_else(|| DEFAULT_JSON_DIR.to_string()),
                ),
            },
        };

        Ok(Self {
            storage,
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        })
    }
}
