use crewtrack_core::db::open_db_in_memory;
use crewtrack_core::{
    Area, AssignmentBatch, AssignmentError, AssignmentRepository, BatchOutcome, CascadeCoordinator,
    Employee, EmployeeId, EmployeeRepository, EntityKind, JsonFileStore, Project, ProjectId,
    ProjectRepository, ProjectStatus, RelationReconciler, RepoError, RepoResult, Role,
    SqliteAssignmentRepository, SqliteEmployeeRepository, SqliteProjectRepository,
    SqliteTaskRepository, Task, TaskId, TaskRepository, TaskStatus,
};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Employee E sits on the ledgers of P and Q and on tasks under both.
/// F shares P's ledger and task to show bystanders are kept.
struct Seed {
    e: EmployeeId,
    f: EmployeeId,
    p: ProjectId,
    q: ProjectId,
    p_task: TaskId,
    q_task: TaskId,
}

fn ids(values: &[Uuid]) -> BTreeSet<Uuid> {
    values.iter().copied().collect()
}

fn hire(employees: &impl EmployeeRepository, handle: &str) -> EmployeeId {
    let employee = Employee::new(
        handle,
        format!("{handle}@example.com"),
        "",
        Area::Support,
        Role::Support,
    );
    employees.create_employee(&employee).unwrap()
}

fn seed(
    employees: &impl EmployeeRepository,
    projects: &impl ProjectRepository,
    tasks: &impl TaskRepository,
) -> Seed {
    let e = hire(employees, "e");
    let f = hire(employees, "f");

    let mut p = Project::new("P", "", "");
    p.manual_ledger = ids(&[e, f]);
    let mut q = Project::new("Q", "", "");
    q.manual_ledger = ids(&[e]);
    q.cancel();
    let p = projects.create_project(&p).unwrap();
    let q = projects.create_project(&q).unwrap();

    let mut p_task = Task::new(p, "P work");
    p_task.assignees = ids(&[e, f]);
    let mut q_task = Task::new(q, "Q work");
    q_task.assignees = ids(&[e]);
    q_task.set_status(TaskStatus::Done);

    Seed {
        e,
        f,
        p,
        q,
        p_task: tasks.create_task(&p_task).unwrap(),
        q_task: tasks.create_task(&q_task).unwrap(),
    }
}

fn ledger(projects: &impl ProjectRepository, id: ProjectId) -> BTreeSet<EmployeeId> {
    projects.get_project(id).unwrap().unwrap().manual_ledger
}

fn assignees(tasks: &impl TaskRepository, id: TaskId) -> BTreeSet<EmployeeId> {
    tasks.get_task(id).unwrap().unwrap().assignees
}

fn delete_employee_strips_every_reference<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(assignments);

    let report = coordinator.delete_employee(s.e).unwrap();

    assert!(report.employee_deleted);
    assert_eq!(report.projects_touched, ids(&[s.p, s.q]));
    assert_eq!(report.tasks_touched, ids(&[s.p_task, s.q_task]));
    assert!(employees.get_employee(s.e).unwrap().is_none());

    assert_eq!(ledger(projects, s.p), ids(&[s.f]));
    assert!(ledger(projects, s.q).is_empty());
    assert_eq!(assignees(tasks, s.p_task), ids(&[s.f]));
    assert!(assignees(tasks, s.q_task).is_empty());

    // Statuses are untouched by cascades.
    assert_eq!(
        projects.get_project(s.q).unwrap().unwrap().status,
        ProjectStatus::Cancelled
    );
    assert_eq!(
        tasks.get_task(s.q_task).unwrap().unwrap().status,
        TaskStatus::Done
    );
}

fn delete_unknown_employee_is_not_found<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(assignments);

    coordinator.delete_employee(s.e).unwrap();
    match coordinator.delete_employee(s.e).unwrap_err() {
        AssignmentError::NotFound { kind, id } => {
            assert_eq!(kind, EntityKind::Employee);
            assert_eq!(id, s.e);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn delete_unreferenced_employee_touches_nothing<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let loner = hire(employees, "loner");
    let version_before = projects.get_project(s.p).unwrap().unwrap().version;
    let coordinator = CascadeCoordinator::new(assignments);

    let report = coordinator.delete_employee(loner).unwrap();

    assert!(report.employee_deleted);
    assert!(report.projects_touched.is_empty());
    assert!(report.tasks_touched.is_empty());
    assert_eq!(
        projects.get_project(s.p).unwrap().unwrap().version,
        version_before
    );
}

fn scoped_removal_leaves_other_projects_alone<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(assignments);

    let report = coordinator.remove_employee_from_project(s.p, s.e).unwrap();

    assert!(!report.employee_deleted);
    assert_eq!(report.projects_touched, ids(&[s.p]));
    assert_eq!(report.tasks_touched, ids(&[s.p_task]));
    assert_eq!(ledger(projects, s.p), ids(&[s.f]));
    assert_eq!(assignees(tasks, s.p_task), ids(&[s.f]));

    assert_eq!(ledger(projects, s.q), ids(&[s.e]));
    assert_eq!(assignees(tasks, s.q_task), ids(&[s.e]));
    assert!(employees.get_employee(s.e).unwrap().is_some());
}

fn scoped_removal_of_task_only_member<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(assignments);

    // F is on P's ledger; G is only reachable through a task under P and a
    // task under Q.
    let g = hire(employees, "g");
    for task_id in [s.p_task, s.q_task] {
        let mut task = tasks.get_task(task_id).unwrap().unwrap();
        let read = task.assignees.clone();
        task.assignees.insert(g);
        tasks.update_task(&task, &read).unwrap();
    }

    coordinator.remove_employee_from_project(s.p, g).unwrap();

    assert!(!assignees(tasks, s.p_task).contains(&g));
    assert!(assignees(tasks, s.q_task).contains(&g));
}

fn scoped_removal_is_idempotent<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(assignments);

    coordinator.remove_employee_from_project(s.p, s.e).unwrap();
    let version = projects.get_project(s.p).unwrap().unwrap().version;
    let again = coordinator.remove_employee_from_project(s.p, s.e).unwrap();

    assert!(again.projects_touched.is_empty());
    assert!(again.tasks_touched.is_empty());
    assert_eq!(projects.get_project(s.p).unwrap().unwrap().version, version);

    let ghost = Uuid::new_v4();
    assert!(coordinator.remove_employee_from_project(s.p, ghost).is_ok());
    assert!(matches!(
        coordinator.remove_employee_from_project(ghost, s.e),
        Err(AssignmentError::NotFound {
            kind: EntityKind::Project,
            ..
        })
    ));
}

fn cascade_invalidates_pending_reconcile_plans<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    make: impl Fn() -> A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let reconciler = RelationReconciler::new(make());
    let coordinator = CascadeCoordinator::new(make());

    // Plan keeps E; the cascade removes E before the plan is applied.
    let plan = reconciler.prepare(s.p, &ids(&[s.e])).unwrap();
    coordinator.delete_employee(s.e).unwrap();

    assert!(matches!(
        reconciler.apply(&plan),
        Err(AssignmentError::ConcurrentModification { .. })
    ));
    assert_eq!(ledger(projects, s.p), ids(&[s.f]));
}

fn stale_task_edit_cannot_undo_scoped_removal<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let stale = tasks.get_task(s.p_task).unwrap().unwrap();
    CascadeCoordinator::new(assignments)
        .remove_employee_from_project(s.p, s.e)
        .unwrap();

    tasks.set_task_status(stale.id, TaskStatus::Done).unwrap();
    tasks.add_logged_hours(stale.id, 2.0).unwrap();
    let mut estimated = stale.clone();
    estimated.estimated_hours = 5.0;
    tasks.update_task(&estimated, &stale.assignees).unwrap();
    assert_eq!(assignees(tasks, s.p_task), ids(&[s.f]));

    let mut reassigned = stale.clone();
    reassigned.assignees.remove(&s.f);
    assert!(matches!(
        tasks.update_task(&reassigned, &stale.assignees),
        Err(RepoError::StaleAssignees { task_id }) if task_id == s.p_task
    ));

    let task = tasks.get_task(s.p_task).unwrap().unwrap();
    assert_eq!(task.assignees, ids(&[s.f]));
    assert_eq!(task.estimated_hours, 5.0);
    assert_eq!(task.logged_hours, 2.0);
    assert_eq!(ledger(projects, s.p), ids(&[s.f]));
}

/// Delegates to a real store but reports references the batch left behind.
struct LeakyStore<A> {
    inner: A,
    leaked: usize,
}

impl<A: AssignmentRepository> AssignmentRepository for LeakyStore<A> {
    fn find_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        self.inner.find_project(id)
    }

    fn find_tasks_by_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>> {
        self.inner.find_tasks_by_project(project_id)
    }

    fn find_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        self.inner.find_employee(id)
    }

    fn unknown_employee_ids(
        &self,
        ids: &BTreeSet<EmployeeId>,
    ) -> RepoResult<BTreeSet<EmployeeId>> {
        self.inner.unknown_employee_ids(ids)
    }

    fn count_employee_references(&self, employee_id: EmployeeId) -> RepoResult<usize> {
        Ok(self.inner.count_employee_references(employee_id)? + self.leaked)
    }

    fn apply_batch(&self, batch: &AssignmentBatch) -> RepoResult<BatchOutcome> {
        self.inner.apply_batch(batch)
    }
}

fn surviving_references_fail_the_delete<E, P, T, A>(
    employees: &E,
    projects: &P,
    tasks: &T,
    assignments: A,
) where
    E: EmployeeRepository,
    P: ProjectRepository,
    T: TaskRepository,
    A: AssignmentRepository,
{
    let s = seed(employees, projects, tasks);
    let coordinator = CascadeCoordinator::new(LeakyStore {
        inner: assignments,
        leaked: 2,
    });

    match coordinator.delete_employee(s.e).unwrap_err() {
        AssignmentError::PartialCascadeFailure {
            employee_id,
            remaining_references,
        } => {
            assert_eq!(employee_id, s.e);
            assert_eq!(remaining_references, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

mod sqlite {
    use super::*;
    use rusqlite::Connection;

    fn repos(
        conn: &Connection,
    ) -> (
        SqliteEmployeeRepository<'_>,
        SqliteProjectRepository<'_>,
        SqliteTaskRepository<'_>,
        SqliteAssignmentRepository<'_>,
    ) {
        (
            SqliteEmployeeRepository::try_new(conn).unwrap(),
            SqliteProjectRepository::try_new(conn).unwrap(),
            SqliteTaskRepository::try_new(conn).unwrap(),
            SqliteAssignmentRepository::try_new(conn).unwrap(),
        )
    }

    #[test]
    fn delete_employee_strips_every_reference() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::delete_employee_strips_every_reference(&e, &p, &t, a);
    }

    #[test]
    fn delete_unknown_employee_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::delete_unknown_employee_is_not_found(&e, &p, &t, a);
    }

    #[test]
    fn delete_unreferenced_employee_touches_nothing() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::delete_unreferenced_employee_touches_nothing(&e, &p, &t, a);
    }

    #[test]
    fn scoped_removal_leaves_other_projects_alone() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::scoped_removal_leaves_other_projects_alone(&e, &p, &t, a);
    }

    #[test]
    fn scoped_removal_of_task_only_member() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::scoped_removal_of_task_only_member(&e, &p, &t, a);
    }

    #[test]
    fn scoped_removal_is_idempotent() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::scoped_removal_is_idempotent(&e, &p, &t, a);
    }

    #[test]
    fn cascade_invalidates_pending_reconcile_plans() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, _) = repos(&conn);
        super::cascade_invalidates_pending_reconcile_plans(&e, &p, &t, || {
            SqliteAssignmentRepository::try_new(&conn).unwrap()
        });
    }

    #[test]
    fn stale_task_edit_cannot_undo_scoped_removal() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::stale_task_edit_cannot_undo_scoped_removal(&e, &p, &t, a);
    }

    #[test]
    fn surviving_references_fail_the_delete() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, a) = repos(&conn);
        super::surviving_references_fail_the_delete(&e, &p, &t, a);
    }

    #[test]
    fn foreign_keys_refuse_deleting_a_still_referenced_employee() {
        let conn = open_db_in_memory().unwrap();
        let (e, p, t, _) = repos(&conn);
        let s = seed(&e, &p, &t);

        let result = conn.execute(
            "DELETE FROM employees WHERE uuid = ?1;",
            [s.e.to_string()],
        );
        assert!(result.is_err());
    }
}

mod json {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path()).unwrap()
    }

    #[test]
    fn delete_employee_strips_every_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::delete_employee_strips_every_reference(&store, &store, &store, store.clone());
    }

    #[test]
    fn delete_unknown_employee_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::delete_unknown_employee_is_not_found(&store, &store, &store, store.clone());
    }

    #[test]
    fn delete_unreferenced_employee_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::delete_unreferenced_employee_touches_nothing(&store, &store, &store, store.clone());
    }

    #[test]
    fn scoped_removal_leaves_other_projects_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::scoped_removal_leaves_other_projects_alone(&store, &store, &store, store.clone());
    }

    #[test]
    fn scoped_removal_of_task_only_member() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::scoped_removal_of_task_only_member(&store, &store, &store, store.clone());
    }

    #[test]
    fn scoped_removal_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::scoped_removal_is_idempotent(&store, &store, &store, store.clone());
    }

    #[test]
    fn stale_task_edit_cannot_undo_scoped_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::stale_task_edit_cannot_undo_scoped_removal(&store, &store, &store, store.clone());
    }

    #[test]
    fn surviving_references_fail_the_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::surviving_references_fail_the_delete(&store, &store, &store, store.clone());
    }

    #[test]
    fn cascade_invalidates_pending_reconcile_plans() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        super::cascade_invalidates_pending_reconcile_plans(&store, &store, &store, || open(&dir));
    }
}
