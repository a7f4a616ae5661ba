//! Project use-case service.
//!
//! # Responsibility
//! - Provide create/update/read entry points for projects.
//! - Expose permissive status changes and cancellation (soft delete).
//!
//! # Invariants
//! - Ledger edits after creation go through `RelationReconciler`, never
//!   through this service.
//! - Cancelled projects stay readable; list views hide them unless asked.

use crate::model::employee::EmployeeId;
use crate::model::project::{Project, ProjectId};
use crate::model::status::ProjectStatus;
use crate::model::EntityKind;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::service::error::ServiceError;
use std::collections::BTreeSet;

/// Request model for creating a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: String,
    pub client: String,
    /// Defaults to `Pending`.
    pub status: Option<ProjectStatus>,
    /// Employees assigned directly at creation.
    pub ledger: BTreeSet<EmployeeId>,
}

/// Request model for replacing a project's descriptive fields and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProjectRequest {
    pub name: String,
    pub description: String,
    pub client: String,
    pub status: ProjectStatus,
}

/// Use-case service wrapper for project records.
pub struct ProjectService<R: ProjectRepository> {
    repo: R,
}

impl<R: ProjectRepository> ProjectService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a project with an optional initial ledger.
    ///
    /// # Errors
    /// - `Validation` for a blank name.
    /// - `UnknownEmployees` when the ledger names missing employees.
    pub fn create_project(&self, request: &CreateProjectRequest) -> Result<Project, ServiceError> {
        let mut project = Project::new(
            request.name.as_str(),
            request.description.as_str(),
            request.client.as_str(),
        );
        if let Some(status) = request.status {
            project.set_status(status);
        }
        project.manual_ledger = request.ledger.clone();
        project.validate()?;

        let id = self.repo.create_project(&project)?;
        self.read_back(id, "created project not found in read-back")
    }

    pub fn update_project(
        &self,
        id: ProjectId,
        request: &UpdateProjectRequest,
    ) -> Result<Project, ServiceError> {
        let mut project = self.load(id)?;
        project.name = request.name.trim().to_string();
        project.description = request.description.trim().to_string();
        project.client = request.client.trim().to_string();
        project.set_status(request.status);
        project.validate()?;

        self.repo.update_project_details(&project)?;
        self.read_back(id, "updated project not found in read-back")
    }

    /// Sets any status from any other.
    pub fn set_status(&self, id: ProjectId, status: ProjectStatus) -> Result<Project, ServiceError> {
        let mut project = self.load(id)?;
        project.set_status(status);
        self.repo.update_project_details(&project)?;
        Ok(project)
    }

    /// Soft-deletes the project by moving it to `Cancelled`.
    pub fn cancel(&self, id: ProjectId) -> Result<Project, ServiceError> {
        self.set_status(id, ProjectStatus::Cancelled)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>, ServiceError> {
        Ok(self.repo.get_project(id)?)
    }

    /// Lists projects in creation order; done and cancelled ones only when
    /// `include_closed` is set.
    pub fn list_projects(&self, include_closed: bool) -> Result<Vec<Project>, ServiceError> {
        Ok(self
            .repo
            .list_projects(&ProjectListQuery { include_closed })?)
    }

    fn load(&self, id: ProjectId) -> Result<Project, ServiceError> {
        self.repo.get_project(id)?.ok_or(ServiceError::NotFound {
            kind: EntityKind::Project,
            id,
        })
    }

    fn read_back(&self, id: ProjectId, details: &'static str) -> Result<Project, ServiceError> {
        self.repo
            .get_project(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}
