//! Error taxonomy shared by every clinic component.
//!
//! Failures are always returned to the caller; the core never formats
//! user-facing messages beyond these `Display` impls and never aborts.

use crate::access::Action;
use crate::ids::ConsultationId;
use crate::model::ConsultationStatus;
use thiserror::Error;

/// Kind of entity an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Patient,
    Practitioner,
    Consultation,
    Condition,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Patient => "patient",
            Entity::Practitioner => "practitioner",
            Entity::Consultation => "consultation",
            Entity::Condition => "condition",
        };
        f.pad(name)
    }
}

/// Errors reported by the directory, staff registry and scheduling engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClinicError {
    /// Id or login unknown
    #[error("{entity} {key} not found")]
    NotFound { entity: Entity, key: String },

    /// Proposed slot overlaps an existing consultation of the same practitioner
    #[error("slot for {practitioner} overlaps consultation #{existing}")]
    Conflict {
        practitioner: String,
        existing: ConsultationId,
    },

    /// Consultation is already terminal (or not in the required state)
    #[error("consultation #{id} is {status}")]
    InvalidTransition {
        id: ConsultationId,
        status: ConsultationStatus,
    },

    /// Id or login already exists at creation
    #[error("{entity} {key} already exists")]
    DuplicateKey { entity: Entity, key: String },

    /// Malformed input (capability code, date, duration, ...)
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Acting account may not perform the requested action
    #[error("{login} is not authorized for {action}")]
    Unauthorized { login: String, action: Action },
}

impl ClinicError {
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        ClinicError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn duplicate(entity: Entity, key: impl ToString) -> Self {
        ClinicError::DuplicateKey {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ClinicError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = ClinicError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClinicError::not_found(Entity::Patient, 12);
        assert_eq!(err.to_string(), "patient 12 not found");

        let err = ClinicError::Conflict {
            practitioner: "dr.house".to_string(),
            existing: ConsultationId(3),
        };
        assert_eq!(err.to_string(), "slot for dr.house overlaps consultation #3");

        let err = ClinicError::InvalidTransition {
            id: ConsultationId(9),
            status: ConsultationStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "consultation #9 is cancelled");
    }

    #[test]
    fn test_validation_helper() {
        let err = ClinicError::validation("capability code", "empty");
        assert!(matches!(
            err,
            ClinicError::Validation { field: "capability code", .. }
        ));
    }
}
