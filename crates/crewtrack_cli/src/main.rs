//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `crewtrack_core` linkage and the configured store.
//! - Keep output deterministic for quick local sanity checks.

use crewtrack_core::{
    core_version, init_logging, open_db, ping, CoreConfig, EmployeeRepository, JsonFileStore,
    ProjectListQuery, ProjectRepository, RepoResult, SqliteEmployeeRepository,
    SqliteProjectRepository, SqliteTaskRepository, StorageBackend, TaskListQuery, TaskRepository,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

struct StoreCounts {
    employees: usize,
    projects: usize,
    tasks: usize,
}

fn main() -> ExitCode {
    println!("crewtrack_core ping={}", ping());
    println!("crewtrack_core version={}", core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("crewtrack: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let (backend, counts) = match &config.storage {
        StorageBackend::Sqlite { db_path } => {
            let conn = open_db(db_path)?;
            let counts = count_records(
                &SqliteEmployeeRepository::try_new(&conn)?,
                &SqliteProjectRepository::try_new(&conn)?,
                &SqliteTaskRepository::try_new(&conn)?,
            )?;
            ("sqlite", counts)
        }
        StorageBackend::Json { dir } => {
            let store = JsonFileStore::open(dir)?;
            ("json", count_records(&store, &store, &store)?)
        }
    };

    println!(
        "store={backend} employees={} projects={} tasks={}",
        counts.employees, counts.projects, counts.tasks
    );
    info!("event=cli_check module=cli status=ok backend={backend}");
    Ok(())
}

fn count_records(
    employees: &impl EmployeeRepository,
    projects: &impl ProjectRepository,
    tasks: &impl TaskRepository,
) -> RepoResult<StoreCounts> {
    Ok(StoreCounts {
        employees: employees.list_employees()?.len(),
        projects: projects
            .list_projects(&ProjectListQuery {
                include_closed: true,
            })?
            .len(),
        tasks: tasks
            .list_tasks(&TaskListQuery {
                project_id: None,
                include_deleted: true,
            })?
            .len(),
    })
}
