//! Field-level validation errors shared by all domain records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Record or input value rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Stable ids must never be the nil UUID.
    NilUuid,
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Email does not have a `local@domain.tld` shape.
    InvalidEmail(String),
    /// Hour counters must be finite and non-negative.
    InvalidHours { field: &'static str, value: f64 },
    /// Logged hour increments must be strictly positive.
    NonPositiveHourEntry(f64),
    /// Text does not name a member of a closed enumeration.
    UnknownValue { kind: &'static str, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUuid => write!(f, "id must not be the nil uuid"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidHours { field, value } => {
                write!(f, "{field} must be a finite non-negative number, got {value}")
            }
            Self::NonPositiveHourEntry(value) => {
                write!(f, "logged hours must be greater than 0, got {value}")
            }
            Self::UnknownValue { kind, value } => write!(f, "unknown {kind}: `{value}`"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_hours(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidHours { field, value });
    }
    Ok(())
}

pub(crate) fn require_hour_entry(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NonPositiveHourEntry(value));
    }
    Ok(())
}
