use crewtrack_core::{
    Area, AssignmentBatch, AssignmentRepository, AssignmentScope, AssignmentWrite,
    CreateEmployeeRequest, CreateProjectRequest, CreateTaskRequest, EmployeeService, EntityKind,
    JsonFileStore, ProjectService, RepoError, Role, ServiceError, TaskService, TaskStatus,
};
use std::collections::BTreeSet;
use std::fs;
use uuid::Uuid;

fn employee_request(email: &str) -> CreateEmployeeRequest {
    CreateEmployeeRequest {
        name: "Sam".to_string(),
        email: email.to_string(),
        specialty: "Ops".to_string(),
        area: Area::Administration,
        role: Role::Devops,
        skills: vec!["terraform".to_string()],
    }
}

#[test]
fn records_survive_reopening_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (employee, project, task) = {
        let store = JsonFileStore::open(dir.path()).unwrap();
        let employee = EmployeeService::new(store.clone())
            .create_employee(&employee_request("sam@example.com"))
            .unwrap();
        let project = ProjectService::new(store.clone())
            .create_project(&CreateProjectRequest {
                name: "Infra".to_string(),
                ledger: BTreeSet::from([employee.id]),
                ..CreateProjectRequest::default()
            })
            .unwrap();
        let task = TaskService::new(store)
            .create_task(&CreateTaskRequest {
                project_id: project.id,
                name: "Rotate keys".to_string(),
                estimated_hours: 2.0,
                status: Some(TaskStatus::InProgress),
                assignees: BTreeSet::from([employee.id]),
            })
            .unwrap();
        (employee, project, task)
    };

    let reopened = JsonFileStore::open(dir.path()).unwrap();
    let employees = EmployeeService::new(reopened.clone());
    let projects = ProjectService::new(reopened.clone());
    let tasks = TaskService::new(reopened);

    assert_eq!(employees.get_employee(employee.id).unwrap(), Some(employee));
    let stored_project = projects.get_project(project.id).unwrap().unwrap();
    assert_eq!(stored_project.manual_ledger, project.manual_ledger);
    assert_eq!(stored_project.version, 2, "task with assignees bumps the owner");
    assert_eq!(tasks.get_task(task.id).unwrap(), Some(task));
}

#[test]
fn failed_batch_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    let employee = EmployeeService::new(store.clone())
        .create_employee(&employee_request("sam@example.com"))
        .unwrap();
    let project = ProjectService::new(store.clone())
        .create_project(&CreateProjectRequest {
            name: "Infra".to_string(),
            ledger: BTreeSet::from([employee.id]),
            ..CreateProjectRequest::default()
        })
        .unwrap();
    let before = fs::read(store.path()).unwrap();

    let mut batch = AssignmentBatch::new();
    batch
        .push(AssignmentWrite::RemoveFromLedgers {
            scope: AssignmentScope::Global,
            employee_ids: BTreeSet::from([employee.id]),
        })
        .push(AssignmentWrite::SetProjectLedger {
            project_id: project.id,
            expected_version: project.version + 7,
            ledger: BTreeSet::new(),
        });

    let err = store.apply_batch(&batch).unwrap_err();
    assert!(matches!(err, RepoError::VersionConflict { .. }));
    assert_eq!(fs::read(store.path()).unwrap(), before);
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[test]
fn duplicate_email_is_rejected_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let service = EmployeeService::new(JsonFileStore::open(dir.path()).unwrap());

    service
        .create_employee(&employee_request("sam@example.com"))
        .unwrap();
    assert!(matches!(
        service.create_employee(&employee_request("SAM@EXAMPLE.COM")),
        Err(ServiceError::DuplicateEmail(_))
    ));
}

#[test]
fn task_under_missing_project_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = TaskService::new(JsonFileStore::open(dir.path()).unwrap());
    let ghost = Uuid::new_v4();

    let err = tasks
        .create_task(&CreateTaskRequest {
            project_id: ghost,
            name: "Orphan".to_string(),
            estimated_hours: 0.0,
            status: None,
            assignees: BTreeSet::new(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { kind: EntityKind::Project, id } if id == ghost
    ));
}

#[test]
fn corrupt_snapshot_is_reported_not_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    fs::write(store.path(), "{ not json").unwrap();

    assert!(matches!(
        store.count_employee_references(Uuid::new_v4()),
        Err(RepoError::Json(_))
    ));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
}
