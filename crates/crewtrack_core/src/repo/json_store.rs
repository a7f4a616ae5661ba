//! Flat-file JSON store implementing every repository contract.
//!
//! # Responsibility
//! - Persist employees, projects and tasks in one snapshot file for
//!   deployments without SQLite.
//! - Offer the same semantic errors and batch atomicity as the SQLite
//!   repositories, so the engine behaves identically on both.
//!
//! # Invariants
//! - Every mutation is read-modify-write on a private copy of the snapshot,
//!   serialized by a per-path lock shared by all handles in the process and
//!   published with fsync-then-rename. A failed mutation leaves the file
//!   untouched.
//! - Reads always load the file, so several store handles on one directory
//!   observe each other's commits and detect version conflicts.

use crate::model::employee::{Employee, EmployeeId};
use crate::model::project::{Project, ProjectId};
use crate::model::status::TaskStatus;
use crate::model::task::{Task, TaskId};
use crate::model::validation::require_hour_entry;
use crate::model::EntityKind;
use crate::repo::assignment_repo::{
    AssignmentBatch, AssignmentRepository, AssignmentWrite, BatchOutcome,
};
use crate::repo::employee_repo::EmployeeRepository;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::{RepoError, RepoResult};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const SNAPSHOT_FILE_NAME: &str = "crewtrack.json";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// One write lock per snapshot path, shared by every handle in the process.
static WRITE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn write_lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = WRITE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    #[serde(default)]
    employees: Vec<Employee>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    tasks: Vec<Task>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            employees: Vec::new(),
            projects: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

impl Snapshot {
    fn employee(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.iter().find(|employee| employee.id == id)
    }

    fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    fn project_mut(&mut self, id: ProjectId) -> RepoResult<&mut Project> {
        self.projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or_else(|| RepoError::not_found(EntityKind::Project, id))
    }

    fn task_mut(&mut self, id: TaskId) -> RepoResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| RepoError::not_found(EntityKind::Task, id))
    }

    fn missing_employees(&self, ids: &BTreeSet<EmployeeId>) -> BTreeSet<EmployeeId> {
        ids.iter()
            .filter(|id| self.employee(**id).is_none())
            .copied()
            .collect()
    }

    fn ensure_employees_exist(&self, ids: &BTreeSet<EmployeeId>) -> RepoResult<()> {
        let missing = self.missing_employees(ids);
        if !missing.is_empty() {
            return Err(RepoError::MissingEmployees(missing));
        }
        Ok(())
    }

    fn ensure_email_available(&self, employee: &Employee) -> RepoResult<()> {
        // ASCII-only folding, the same rule as SQLite's `COLLATE NOCASE`.
        let taken = self.employees.iter().any(|other| {
            other.id != employee.id && other.email.eq_ignore_ascii_case(&employee.email)
        });
        if taken {
            return Err(RepoError::DuplicateEmail(employee.email.clone()));
        }
        Ok(())
    }

    fn bump_versions(&mut self, project_ids: &BTreeSet<ProjectId>) {
        for project in &mut self.projects {
            if project_ids.contains(&project.id) {
                project.version += 1;
            }
        }
    }

    fn apply_batch(&mut self, batch: &AssignmentBatch) -> RepoResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for write in batch.writes() {
            match write {
                AssignmentWrite::SetProjectLedger {
                    project_id,
                    expected_version,
                    ledger,
                } => {
                    let actual = self.project_mut(*project_id)?.version;
                    if actual != *expected_version {
                        return Err(RepoError::VersionConflict {
                            project_id: *project_id,
                            expected: *expected_version,
                            actual,
                        });
                    }
                    self.ensure_employees_exist(ledger)?;

                    let project = self.project_mut(*project_id)?;
                    if project.manual_ledger != *ledger {
                        project.manual_ledger = ledger.clone();
                        outcome.projects_touched.insert(*project_id);
                    }
                }
                AssignmentWrite::RemoveFromLedgers {
                    scope,
                    employee_ids,
                } => {
                    for project in &mut self.projects {
                        if !scope.covers(project.id) {
                            continue;
                        }
                        let before = project.manual_ledger.len();
                        project
                            .manual_ledger
                            .retain(|id| !employee_ids.contains(id));
                        if project.manual_ledger.len() != before {
                            outcome.projects_touched.insert(project.id);
                        }
                    }
                }
                AssignmentWrite::RemoveFromTaskAssignments {
                    scope,
                    employee_ids,
                } => {
                    for task in &mut self.tasks {
                        if !scope.covers(task.project_id) {
                            continue;
                        }
                        let before = task.assignees.len();
                        task.assignees.retain(|id| !employee_ids.contains(id));
                        if task.assignees.len() != before {
                            outcome.tasks_touched.insert(task.id);
                            outcome.projects_touched.insert(task.project_id);
                        }
                    }
                }
                AssignmentWrite::DeleteEmployee { employee_id } => {
                    if self.reference_count(*employee_id) > 0 {
                        return Err(RepoError::InvalidData(format!(
                            "employee {employee_id} is still referenced by assignments"
                        )));
                    }
                    let before = self.employees.len();
                    self.employees.retain(|employee| employee.id != *employee_id);
                    if self.employees.len() == before {
                        return Err(RepoError::not_found(EntityKind::Employee, *employee_id));
                    }
                    outcome.employee_deleted = Some(*employee_id);
                }
            }
        }

        self.bump_versions(&outcome.projects_touched);
        Ok(outcome)
    }

    fn reference_count(&self, employee_id: EmployeeId) -> usize {
        let in_ledgers = self
            .projects
            .iter()
            .filter(|project| project.manual_ledger.contains(&employee_id))
            .count();
        let in_tasks = self
            .tasks
            .iter()
            .filter(|task| task.assignees.contains(&employee_id))
            .count();
        in_ledgers + in_tasks
    }
}

struct StoreInner {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

/// JSON snapshot store rooted at one directory.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<StoreInner>,
}

impl JsonFileStore {
    /// Opens (or initializes) the snapshot file under `dir`.
    ///
    /// # Errors
    /// - Returns `Io` when the directory or file cannot be created or read.
    /// - Returns `Json`/`InvalidData` when the existing file is malformed or
    ///   written by a newer format.
    pub fn open(dir: impl AsRef<Path>) -> RepoResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = fs::canonicalize(dir)?.join(SNAPSHOT_FILE_NAME);
        let store = Self {
            inner: Arc::new(StoreInner {
                write_lock: write_lock_for(&path),
                path,
            }),
        };

        let snapshot = {
            let _guard = store.lock();
            if !store.inner.path.exists() {
                store.write_snapshot(&Snapshot::default())?;
            }
            store.read_snapshot()?
        };
        info!(
            "event=store_open module=repo backend=json status=ok employees={} projects={} tasks={}",
            snapshot.employees.len(),
            snapshot.projects.len(),
            snapshot.tasks.len()
        );
        Ok(store)
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn read_snapshot(&self) -> RepoResult<Snapshot> {
        let text = fs::read_to_string(&self.inner.path)?;
        let snapshot: Snapshot = serde_json::from_str(&text)?;
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(RepoError::InvalidData(format!(
                "snapshot format version {} is newer than supported {}",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> RepoResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let staging = self.inner.path.with_extension("json.tmp");
        let mut file = File::create(&staging)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, &self.inner.path)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut Snapshot) -> RepoResult<T>) -> RepoResult<T> {
        let _guard = self.lock();
        let mut snapshot = self.read_snapshot()?;
        let result = change(&mut snapshot)?;
        self.write_snapshot(&snapshot)?;
        Ok(result)
    }
}

impl EmployeeRepository for JsonFileStore {
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId> {
        employee.validate()?;
        self.mutate(|snapshot| {
            if snapshot.employee(employee.id).is_some() {
                return Err(RepoError::InvalidData(format!(
                    "employee id already exists: {}",
                    employee.id
                )));
            }
            snapshot.ensure_email_available(employee)?;
            snapshot.employees.push(employee.clone());
            Ok(employee.id)
        })
    }

    fn update_employee(&self, employee: &Employee) -> RepoResult<()> {
        employee.validate()?;
        self.mutate(|snapshot| {
            snapshot.ensure_email_available(employee)?;
            let slot = snapshot
                .employees
                .iter_mut()
                .find(|current| current.id == employee.id)
                .ok_or_else(|| RepoError::not_found(EntityKind::Employee, employee.id))?;
            *slot = employee.clone();
            Ok(())
        })
    }

    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        Ok(self.read_snapshot()?.employee(id).cloned())
    }

    fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        let mut employees = self.read_snapshot()?.employees;
        employees.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(employees)
    }

    fn missing_employee_ids(
        &self,
        ids: &BTreeSet<EmployeeId>,
    ) -> RepoResult<BTreeSet<EmployeeId>> {
        Ok(self.read_snapshot()?.missing_employees(ids))
    }
}

impl ProjectRepository for JsonFileStore {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;
        self.mutate(|snapshot| {
            if snapshot.project(project.id).is_some() {
                return Err(RepoError::InvalidData(format!(
                    "project id already exists: {}",
                    project.id
                )));
            }
            snapshot.ensure_employees_exist(&project.manual_ledger)?;
            let mut stored = project.clone();
            stored.version = 1;
            snapshot.projects.push(stored);
            Ok(project.id)
        })
    }

    fn update_project_details(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        self.mutate(|snapshot| {
            let stored = snapshot.project_mut(project.id)?;
            stored.name = project.name.clone();
            stored.description = project.description.clone();
            stored.client = project.client.clone();
            stored.status = project.status;
            Ok(())
        })
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        Ok(self.read_snapshot()?.project(id).cloned())
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .read_snapshot()?
            .projects
            .into_iter()
            .filter(|project| query.include_closed || project.is_open())
            .collect();
        projects.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(projects)
    }
}

impl TaskRepository for JsonFileStore {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;
        self.mutate(|snapshot| {
            if snapshot.tasks.iter().any(|current| current.id == task.id) {
                return Err(RepoError::InvalidData(format!(
                    "task id already exists: {}",
                    task.id
                )));
            }
            if snapshot.project(task.project_id).is_none() {
                return Err(RepoError::not_found(EntityKind::Project, task.project_id));
            }
            snapshot.ensure_employees_exist(&task.assignees)?;
            snapshot.tasks.push(task.clone());
            if !task.assignees.is_empty() {
                snapshot.bump_versions(&BTreeSet::from([task.project_id]));
            }
            Ok(task.id)
        })
    }

    fn update_task(&self, task: &Task, read_assignees: &BTreeSet<EmployeeId>) -> RepoResult<()> {
        task.validate()?;
        self.mutate(|snapshot| {
            if snapshot.project(task.project_id).is_none() {
                return Err(RepoError::not_found(EntityKind::Project, task.project_id));
            }
            let reassigning = task.assignees != *read_assignees;
            if reassigning {
                snapshot.ensure_employees_exist(&task.assignees)?;
            }
            let slot = snapshot.task_mut(task.id)?;
            if reassigning && slot.assignees != *read_assignees {
                return Err(RepoError::StaleAssignees { task_id: task.id });
            }

            let previous_owner = slot.project_id;
            let assignees_changed = reassigning && slot.assignees != task.assignees;
            slot.project_id = task.project_id;
            slot.name = task.name.clone();
            slot.estimated_hours = task.estimated_hours;
            slot.status = task.status;
            if assignees_changed {
                slot.assignees = task.assignees.clone();
            }
            if assignees_changed || previous_owner != task.project_id {
                snapshot.bump_versions(&BTreeSet::from([previous_owner, task.project_id]));
            }
            Ok(())
        })
    }

    fn set_task_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        self.mutate(|snapshot| {
            snapshot.task_mut(id)?.set_status(status);
            Ok(())
        })
    }

    fn add_logged_hours(&self, id: TaskId, hours: f64) -> RepoResult<()> {
        require_hour_entry(hours)?;
        self.mutate(|snapshot| {
            snapshot.task_mut(id)?.logged_hours += hours;
            Ok(())
        })
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        Ok(self
            .read_snapshot()?
            .tasks
            .into_iter()
            .find(|task| task.id == id))
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .read_snapshot()?
            .tasks
            .into_iter()
            .filter(|task| query.project_id.map_or(true, |id| task.project_id == id))
            .filter(|task| query.include_deleted || !task.is_deleted())
            .collect();
        tasks.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(tasks)
    }
}

impl AssignmentRepository for JsonFileStore {
    fn find_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        self.get_project(id)
    }

    fn find_tasks_by_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>> {
        self.list_tasks(&TaskListQuery {
            project_id: Some(project_id),
            include_deleted: true,
        })
    }

    fn find_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        self.get_employee(id)
    }

    fn unknown_employee_ids(
        &self,
        ids: &BTreeSet<EmployeeId>,
    ) -> RepoResult<BTreeSet<EmployeeId>> {
        Ok(self.read_snapshot()?.missing_employees(ids))
    }

    fn count_employee_references(&self, employee_id: EmployeeId) -> RepoResult<usize> {
        Ok(self.read_snapshot()?.reference_count(employee_id))
    }

    fn apply_batch(&self, batch: &AssignmentBatch) -> RepoResult<BatchOutcome> {
        let outcome = self.mutate(|snapshot| snapshot.apply_batch(batch))?;
        debug!(
            "event=assignment_batch module=repo backend=json status=ok writes={} projects={} tasks={}",
            batch.writes().len(),
            outcome.projects_touched.len(),
            outcome.tasks_touched.len()
        );
        Ok(outcome)
    }
}
