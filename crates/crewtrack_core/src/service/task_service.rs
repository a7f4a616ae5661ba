//! Task use-case service.
//!
//! # Responsibility
//! - Provide create/update/read entry points for tasks.
//! - Handle hour logging, status changes and soft deletion.
//! - Produce the board listing order used by "all tasks" views.
//!
//! # Invariants
//! - Deleting a task is a status change; its hours stay queryable.
//! - Board order is pending, then in-progress, then done/deleted, with ties
//!   broken by creation time.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::status::TaskStatus;
use crate::model::task::{Task, TaskId};
use crate::model::validation::require_hours;
use crate::model::EntityKind;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::service::error::ServiceError;
use std::collections::BTreeSet;

/// Request model for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    pub project_id: ProjectId,
    pub name: String,
    pub estimated_hours: f64,
    /// Defaults to `Pending`.
    pub status: Option<TaskStatus>,
    pub assignees: BTreeSet<EmployeeId>,
}

/// Request model for replacing a task. Moving it to another project and
/// reassigning it are both allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTaskRequest {
    pub project_id: ProjectId,
    pub name: String,
    pub estimated_hours: f64,
    pub status: TaskStatus,
    pub assignees: BTreeSet<EmployeeId>,
}

/// Use-case service wrapper for task records.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a task under an existing project.
    ///
    /// # Errors
    /// - `NotFound` when the project does not exist.
    /// - `UnknownEmployees` when an assignee has no employee record.
    pub fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ServiceError> {
        require_hours("estimated_hours", request.estimated_hours)?;
        let mut task = Task::new(request.project_id, request.name.as_str());
        task.estimated_hours = request.estimated_hours;
        if let Some(status) = request.status {
            task.set_status(status);
        }
        task.assignees = request.assignees.clone();
        task.validate()?;

        let id = self.repo.create_task(&task)?;
        self.repo
            .get_task(id)?
            .ok_or(ServiceError::InconsistentState(
                "created task not found in read-back",
            ))
    }

    /// Replaces a task's details and, when they differ from the stored
    /// ones, its assignees.
    ///
    /// # Errors
    /// - `Conflict` when the assignees were changed by someone else between
    ///   the read and the write; nothing is written.
    pub fn update_task(
        &self,
        id: TaskId,
        request: &UpdateTaskRequest,
    ) -> Result<Task, ServiceError> {
        let mut task = self.load(id)?;
        let read_assignees = task.assignees.clone();
        task.project_id = request.project_id;
        task.name = request.name.trim().to_string();
        task.estimated_hours = request.estimated_hours;
        task.set_status(request.status);
        task.assignees = request.assignees.clone();
        task.validate()?;

        self.repo.update_task(&task, &read_assignees)?;
        self.load(id)
    }

    /// Sets any status from any other. Assignments are not rewritten.
    pub fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, ServiceError> {
        self.repo.set_task_status(id, status)?;
        self.load(id)
    }

    /// Adds a strictly positive number of worked hours.
    pub fn log_hours(&self, id: TaskId, hours: f64) -> Result<Task, ServiceError> {
        self.repo.add_logged_hours(id, hours)?;
        self.load(id)
    }

    /// Moves the task to `Deleted`. Assignments and hours are kept.
    pub fn soft_delete(&self, id: TaskId) -> Result<Task, ServiceError> {
        self.set_status(id, TaskStatus::Deleted)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, ServiceError> {
        Ok(self.repo.get_task(id)?)
    }

    /// Lists one project's tasks in creation order.
    pub fn list_by_project(
        &self,
        project_id: ProjectId,
        include_deleted: bool,
    ) -> Result<Vec<Task>, ServiceError> {
        Ok(self.repo.list_tasks(&TaskListQuery {
            project_id: Some(project_id),
            include_deleted,
        })?)
    }

    /// Lists every task, deleted ones included, in board order.
    pub fn list_all(&self) -> Result<Vec<Task>, ServiceError> {
        let mut tasks = self.repo.list_tasks(&TaskListQuery {
            project_id: None,
            include_deleted: true,
        })?;
        sort_for_board(&mut tasks);
        Ok(tasks)
    }

    fn load(&self, id: TaskId) -> Result<Task, ServiceError> {
        self.repo.get_task(id)?.ok_or(ServiceError::NotFound {
            kind: EntityKind::Task,
            id,
        })
    }
}

/// Sorts by status rank, then creation time, then id.
pub fn sort_for_board(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        (a.status.board_rank(), a.created_at, a.id).cmp(&(
            b.status.board_rank(),
            b.created_at,
            b.id,
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::sort_for_board;
    use crate::model::status::TaskStatus;
    use crate::model::task::Task;
    use uuid::Uuid;

    fn task(status: TaskStatus, created_at: i64) -> Task {
        let mut task = Task::new(Uuid::new_v4(), format!("{status}-{created_at}"));
        task.status = status;
        task.created_at = created_at;
        task
    }

    #[test]
    fn board_order_puts_open_work_first() {
        let mut tasks = vec![
            task(TaskStatus::Deleted, 1),
            task(TaskStatus::InProgress, 5),
            task(TaskStatus::Done, 0),
            task(TaskStatus::Pending, 9),
            task(TaskStatus::Pending, 2),
        ];
        sort_for_board(&mut tasks);

        let order: Vec<(TaskStatus, i64)> = tasks
            .iter()
            .map(|task| (task.status, task.created_at))
            .collect();
        assert_eq!(
            order,
            vec![
                (TaskStatus::Pending, 2),
                (TaskStatus::Pending, 9),
                (TaskStatus::InProgress, 5),
                (TaskStatus::Done, 0),
                (TaskStatus::Deleted, 1),
            ]
        );
    }
}
