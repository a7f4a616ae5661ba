//! Employee use-case service.
//!
//! # Responsibility
//! - Provide create/update/read entry points for employee profiles.
//! - Handle activation toggles and skill updates.
//!
//! # Invariants
//! - Hard deletion is not offered here; it belongs to `CascadeCoordinator`
//!   so references are always cleaned up with the record.

use crate::model::employee::{Area, Employee, EmployeeId, Role};
use crate::model::EntityKind;
use crate::repo::employee_repo::EmployeeRepository;
use crate::service::error::ServiceError;

/// Request model for creating an employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub area: Area,
    pub role: Role,
    /// Initial skills; blanks and repeats are dropped.
    pub skills: Vec<String>,
}

/// Request model for replacing an employee's profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEmployeeRequest {
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub area: Area,
    pub role: Role,
}

/// Use-case service wrapper for employee records.
pub struct EmployeeService<R: EmployeeRepository> {
    repo: R,
}

impl<R: EmployeeRepository> EmployeeService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an active employee.
    ///
    /// # Errors
    /// - `Validation` for blank names or malformed emails.
    /// - `DuplicateEmail` when another employee uses the email.
    pub fn create_employee(
        &self,
        request: &CreateEmployeeRequest,
    ) -> Result<Employee, ServiceError> {
        let mut employee = Employee::new(
            request.name.as_str(),
            request.email.as_str(),
            request.specialty.as_str(),
            request.area,
            request.role,
        );
        employee.add_skills(&request.skills);
        employee.validate()?;

        let id = self.repo.create_employee(&employee)?;
        self.repo
            .get_employee(id)?
            .ok_or(ServiceError::InconsistentState(
                "created employee not found in read-back",
            ))
    }

    /// Replaces name, email, specialty, area and role.
    pub fn update_employee(
        &self,
        id: EmployeeId,
        request: &UpdateEmployeeRequest,
    ) -> Result<Employee, ServiceError> {
        let mut employee = self.load(id)?;
        employee.name = request.name.trim().to_string();
        employee.email = request.email.trim().to_string();
        employee.specialty = request.specialty.trim().to_string();
        employee.area = request.area;
        employee.role = request.role;
        employee.validate()?;

        self.repo.update_employee(&employee)?;
        Ok(employee)
    }

    pub fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>, ServiceError> {
        Ok(self.repo.get_employee(id)?)
    }

    /// Lists employees in creation order.
    pub fn list_employees(&self) -> Result<Vec<Employee>, ServiceError> {
        Ok(self.repo.list_employees()?)
    }

    /// Activates or deactivates an employee. Inactive employees stay valid
    /// assignment targets.
    pub fn set_active(&self, id: EmployeeId, active: bool) -> Result<Employee, ServiceError> {
        let mut employee = self.load(id)?;
        if active {
            employee.activate();
        } else {
            employee.deactivate();
        }
        self.repo.update_employee(&employee)?;
        Ok(employee)
    }

    /// Appends skills, skipping blanks and skills already held.
    pub fn add_skills<I, S>(&self, id: EmployeeId, skills: I) -> Result<Employee, ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut employee = self.load(id)?;
        employee.add_skills(skills);
        self.repo.update_employee(&employee)?;
        Ok(employee)
    }

    fn load(&self, id: EmployeeId) -> Result<Employee, ServiceError> {
        self.repo
            .get_employee(id)?
            .ok_or(ServiceError::NotFound {
                kind: EntityKind::Employee,
                id,
            })
    }
}
