//! Clinic Core - consultation scheduling and authorization for a medical office
//!
//! In-process engine behind a single-operator office front-end: practitioner
//! accounts gated by capability codes, conflict-free consultation booking,
//! planning views and patient medical records.
//!
//! # Features
//!
//! - Capability codes (`"143"`) parsed into a typed [`Capabilities`] set
//! - Per-practitioner no-overlap guarantee on half-open time intervals
//! - Consultation lifecycle `Scheduled -> Completed | Cancelled`
//! - Day / week / month / range planning views and office statistics
//! - Patient directory with medical records and condition history
//! - JSON snapshot persistence and TOML configuration
//!
//! # Example
//!
//! ```rust
//! use clinic_core::{Clinic, NewPatient, PatientId, Practitioner, Sex};
//! use chrono::NaiveDate;
//!
//! let mut clinic = Clinic::new();
//! clinic
//!     .staff_mut()
//!     .create(Practitioner::new("dr.martin", "pw", "Paul", "Martin", "GP", "12345".parse().unwrap()))
//!     .unwrap();
//! clinic
//!     .create_patient("dr.martin", NewPatient::new(PatientId(1), "Jane", "Doe", Sex::Female))
//!     .unwrap();
//!
//! let at = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let id = clinic.schedule("dr.martin", at, "Checkup", "dr.martin", PatientId(1), None).unwrap();
//!
//! // 09:15 falls inside the 30 minute slot booked above
//! let clash = at + chrono::Duration::minutes(15);
//! assert!(clinic.schedule("dr.martin", clash, "Flu", "dr.martin", PatientId(1), None).is_err());
//!
//! clinic.close("dr.martin", id, "BP 120/80", "Healthy").unwrap();
//! ```

pub mod access;
pub mod clinic;
pub mod config;
pub mod directory;
pub mod error;
pub mod ids;
pub mod model;
pub mod planning;
pub mod scheduling;
pub mod staff;
pub mod store;

// Re-export commonly used types for convenience
pub use access::{is_authorized, Action, Capabilities};
pub use clinic::{Clinic, PatientHistory};
pub use config::{ClinicConfig, ConfigError};
pub use directory::{ConditionUpdate, PatientDirectory, PatientUpdate};
pub use error::{ClinicError, Entity, Result};
pub use ids::{ConditionId, ConsultationId, IdSequence, PatientId, RecordId};
pub use model::{
    Condition, Consultation, ConsultationStatus, MedicalRecord, NewCondition, NewPatient, Patient,
    Practitioner, Severity, Sex, DEFAULT_DURATION_MINUTES,
};
pub use planning::ClinicStats;
pub use scheduling::Schedule;
pub use staff::StaffRegistry;
pub use store::{Snapshot, SnapshotStore, StoreError};
