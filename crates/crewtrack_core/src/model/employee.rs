//! Employee domain model.
//!
//! # Responsibility
//! - Define the employee record referenced by project ledgers and task
//!   assignment lists.
//! - Provide profile helpers (activation, skill updates) and validation.
//!
//! # Invariants
//! - `id` is stable and never the nil UUID.
//! - `name` and `email` are non-blank; `email` has a `local@domain.tld` shape.
//! - `skills` keeps insertion order and holds no blank or repeated entries.

use crate::model::now_epoch_ms;
use crate::model::validation::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable identifier for employees.
pub type EmployeeId = Uuid;

/// Job role held by an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Developer,
    Qa,
    Devops,
    Support,
    Accountant,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Administrator,
        Role::Developer,
        Role::Qa,
        Role::Devops,
        Role::Support,
        Role::Accountant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Developer => "developer",
            Self::Qa => "qa",
            Self::Devops => "devops",
            Self::Support => "support",
            Self::Accountant => "accountant",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "role",
                value: value.to_string(),
            })
    }
}

/// Organizational area an employee belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Development,
    Administration,
    Support,
    Accounting,
}

impl Area {
    pub const ALL: [Area; 4] = [
        Area::Development,
        Area::Administration,
        Area::Support,
        Area::Accounting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Administration => "administration",
            Self::Support => "support",
            Self::Accounting => "accounting",
        }
    }
}

impl Display for Area {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|area| area.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "area",
                value: value.to_string(),
            })
    }
}

/// Employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    /// Unique across employees, compared case-insensitively by stores.
    pub email: String,
    /// Free-form specialty label, e.g. "Backend - Rust".
    pub specialty: String,
    pub area: Area,
    pub role: Role,
    pub skills: Vec<String>,
    pub is_active: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Employee {
    /// Creates an active employee with a generated id and no skills.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        specialty: impl Into<String>,
        area: Area,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            specialty: specialty.into().trim().to_string(),
            area,
            role,
            skills: Vec::new(),
            is_active: true,
            created_at: now_epoch_ms(),
        }
    }

    /// Creates an employee with a caller-provided stable id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: EmployeeId,
        name: impl Into<String>,
        email: impl Into<String>,
        specialty: impl Into<String>,
        area: Area,
        role: Role,
    ) -> Result<Self, ValidationError> {
        if id.is_nil() {
            return Err(ValidationError::NilUuid);
        }
        let mut employee = Self::new(name, email, specialty, area, role);
        employee.id = id;
        Ok(employee)
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Appends skills in order, skipping blanks and skills already held.
    pub fn add_skills<I, S>(&mut self, skills: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for skill in skills {
            let trimmed = skill.as_ref().trim();
            if trimmed.is_empty() || self.skills.iter().any(|held| held == trimmed) {
                continue;
            }
            self.skills.push(trimmed.to_string());
        }
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilUuid);
        }
        require_text("employee name", &self.name)?;
        require_text("employee email", &self.email)?;
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        if self.skills.iter().any(|skill| skill.trim().is_empty()) {
            return Err(ValidationError::BlankField("employee skill"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Area, Employee, Role};
    use crate::model::validation::ValidationError;

    fn sample() -> Employee {
        Employee::new(
            " Ana Gómez ",
            "ana@example.com",
            "Backend - Rust",
            Area::Development,
            Role::Developer,
        )
    }

    #[test]
    fn new_employee_is_active_and_trimmed() {
        let employee = sample();
        assert!(employee.is_active);
        assert_eq!(employee.name, "Ana Gómez");
        assert!(employee.validate().is_ok());
    }

    #[test]
    fn add_skills_keeps_order_and_skips_repeats() {
        let mut employee = sample();
        employee.add_skills(["rust", " sql ", "", "rust"]);
        employee.add_skills(vec!["docker".to_string(), "sql".to_string()]);
        assert_eq!(employee.skills, vec!["rust", "sql", "docker"]);
    }

    #[test]
    fn validate_rejects_malformed_email() {
        let mut employee = sample();
        employee.email = "ana.example.com".to_string();
        assert_eq!(
            employee.validate(),
            Err(ValidationError::InvalidEmail("ana.example.com".to_string()))
        );
    }

    #[test]
    fn role_and_area_parse_case_insensitively() {
        assert_eq!("QA".parse::<Role>(), Ok(Role::Qa));
        assert_eq!("DevOps".parse::<Role>(), Ok(Role::Devops));
        assert_eq!(" Accounting ".parse::<Area>(), Ok(Area::Accounting));
        assert!("intern".parse::<Role>().is_err());
    }
}
