//! Core domain logic for crewtrack.
//! This crate is the single source of truth for the employee/project/task
//! assignment invariants; storage backends only execute primitive writes.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, StorageBackend};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::employee::{Area, Employee, EmployeeId, Role};
pub use model::project::{Project, ProjectId};
pub use model::status::{ProjectStatus, TaskStatus};
pub use model::task::{Task, TaskId};
pub use model::validation::ValidationError;
pub use model::EntityKind;
pub use repo::assignment_repo::{
    AssignmentBatch, AssignmentRepository, AssignmentScope, AssignmentWrite, BatchOutcome,
    SqliteAssignmentRepository,
};
pub use repo::employee_repo::{EmployeeRepository, SqliteEmployeeRepository};
pub use repo::json_store::JsonFileStore;
pub use repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
pub use repo::{RepoError, RepoResult};
pub use service::cascade_coordinator::{CascadeCoordinator, CascadeReport};
pub use service::employee_service::{
    CreateEmployeeRequest, EmployeeService, UpdateEmployeeRequest,
};
pub use service::error::{AssignmentError, ServiceError};
pub use service::project_service::{CreateProjectRequest, ProjectService, UpdateProjectRequest};
pub use service::relation_reconciler::{
    effective_set, reconcile, ReconcileDiff, ReconcilePlan, RelationReconciler,
};
pub use service::task_service::{CreateTaskRequest, TaskService, UpdateTaskRequest};

/// Minimal health-check API for smoke tests.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
