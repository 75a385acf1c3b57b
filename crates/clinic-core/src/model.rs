//! Entity model: patients, practitioners, consultations and medical records.
//!
//! Entities hold plain data plus the little derived behavior they need
//! (interval arithmetic, timestamps). Consultations are referenced by id
//! from records and plannings; they are owned by the
//! [`Schedule`](crate::scheduling::Schedule).

use crate::access::Capabilities;
use crate::error::ClinicError;
use crate::ids::{ConditionId, ConsultationId, PatientId, RecordId};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Consultation length used when the caller does not choose one
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

// ============================================================================
// Patient
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            other => Err(ClinicError::validation(
                "sex",
                format!("expected M or F, got '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Sex::Male => "M",
            Sex::Female => "F",
        })
    }
}

/// Patient demographics and their medical record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub surname: String,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    /// National health insurance number
    pub national_id: Option<String>,
    pub blood_group: Option<String>,
    record: MedicalRecord,
}

impl Patient {
    pub(crate) fn from_new(new: NewPatient, record: MedicalRecord) -> Self {
        Patient {
            id: new.id,
            name: new.name,
            surname: new.surname,
            sex: new.sex,
            birth_date: new.birth_date,
            national_id: new.national_id,
            blood_group: new.blood_group,
            record,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }

    pub fn record(&self) -> &MedicalRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut MedicalRecord {
        &mut self.record
    }
}

/// Input for patient creation; the directory attaches the medical record.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPatient {
    pub id: PatientId,
    pub name: String,
    pub surname: String,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub national_id: Option<String>,
    pub blood_group: Option<String>,
}

impl NewPatient {
    pub fn new(id: PatientId, name: impl Into<String>, surname: impl Into<String>, sex: Sex) -> Self {
        NewPatient {
            id,
            name: name.into(),
            surname: surname.into(),
            sex,
            birth_date: None,
            national_id: None,
            blood_group: None,
        }
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    pub fn with_national_id(mut self, national_id: impl Into<String>) -> Self {
        self.national_id = Some(national_id.into());
        self
    }

    pub fn with_blood_group(mut self, blood_group: impl Into<String>) -> Self {
        self.blood_group = Some(blood_group.into());
        self
    }
}

// ============================================================================
// Medical record & conditions
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

impl FromStr for Severity {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "mild" => Ok(Severity::Mild),
            "2" | "moderate" => Ok(Severity::Moderate),
            "3" | "severe" => Ok(Severity::Severe),
            other => Err(ClinicError::validation(
                "severity",
                format!("expected mild, moderate or severe, got '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        })
    }
}

/// Medical history entry (allergy, chronic illness, surgery, ...)
///
/// Only severity and the active flag change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    id: ConditionId,
    kind: String,
    description: String,
    onset: NaiveDate,
    severity: Severity,
    active: bool,
}

impl Condition {
    pub(crate) fn from_new(id: ConditionId, new: NewCondition) -> Self {
        Condition {
            id,
            kind: new.kind,
            description: new.description,
            onset: new.onset,
            severity: new.severity,
            active: new.active,
        }
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn onset(&self) -> NaiveDate {
        self.onset
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Input for a new condition; severity defaults to moderate, active to true.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCondition {
    pub kind: String,
    pub description: String,
    pub onset: NaiveDate,
    pub severity: Severity,
    pub active: bool,
}

impl NewCondition {
    pub fn new(kind: impl Into<String>, description: impl Into<String>, onset: NaiveDate) -> Self {
        NewCondition {
            kind: kind.into(),
            description: description.into(),
            onset,
            severity: Severity::default(),
            active: true,
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Patient-owned container of conditions and consultation history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    id: RecordId,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    conditions: Vec<Condition>,
    consultations: Vec<ConsultationId>,
}

impl MedicalRecord {
    pub(crate) fn new(id: RecordId, now: NaiveDateTime) -> Self {
        MedicalRecord {
            id,
            created_at: now,
            updated_at: now,
            conditions: Vec::new(),
            consultations: Vec::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn consultations(&self) -> &[ConsultationId] {
        &self.consultations
    }

    pub(crate) fn add_condition(&mut self, condition: Condition, now: NaiveDateTime) {
        self.conditions.push(condition);
        self.touch(now);
    }

    pub(crate) fn condition_mut(&mut self, id: ConditionId) -> Option<&mut Condition> {
        self.conditions.iter_mut().find(|c| c.id == id)
    }

    pub(crate) fn link_consultation(&mut self, id: ConsultationId, now: NaiveDateTime) {
        self.consultations.push(id);
        self.touch(now);
    }

    /// Re-attach a consultation while loading; the timestamp is kept.
    pub(crate) fn relink_consultation(&mut self, id: ConsultationId) {
        self.consultations.push(id);
    }

    pub(crate) fn clear_consultations(&mut self) {
        self.consultations.clear();
    }

    pub(crate) fn touch(&mut self, now: NaiveDateTime) {
        // Clock skew must not move the record backwards
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

// ============================================================================
// Practitioner
// ============================================================================

/// Staff account of a health professional
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Practitioner {
    pub login: String,
    password: String,
    pub name: String,
    pub surname: String,
    pub specialty: String,
    /// Professional registration number
    #[serde(default)]
    pub order_number: Option<String>,
    /// Free-text opening hours
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub active: bool,
    pub capabilities: Capabilities,
}

impl Practitioner {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
        surname: impl Into<String>,
        specialty: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        Practitioner {
            login: login.into(),
            password: password.into(),
            name: name.into(),
            surname: surname.into(),
            specialty: specialty.into(),
            order_number: None,
            availability: None,
            email: None,
            phone: None,
            active: true,
            capabilities,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }

    /// Plain comparison; credentials are not hashed in this system.
    pub fn password_matches(&self, password: &str) -> bool {
        self.password == password
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }
}

impl std::fmt::Debug for Practitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Practitioner")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("surname", &self.surname)
            .field("specialty", &self.specialty)
            .field("active", &self.active)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// ============================================================================
// Consultation
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConsultationStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConsultationStatus::Scheduled)
    }

    /// Whether the consultation occupies its practitioner's time
    pub fn blocks_slot(self) -> bool {
        !matches!(self, ConsultationStatus::Cancelled)
    }
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        })
    }
}

/// Appointment between one practitioner and one patient
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    id: ConsultationId,
    scheduled_at: NaiveDateTime,
    reason: String,
    duration_minutes: u32,
    status: ConsultationStatus,
    #[serde(default)]
    observations: Option<String>,
    #[serde(default)]
    diagnosis: Option<String>,
    practitioner: String,
    patient: PatientId,
}

impl Consultation {
    /// New scheduled consultation with the default duration
    pub fn new(
        id: ConsultationId,
        scheduled_at: NaiveDateTime,
        reason: impl Into<String>,
        practitioner: impl Into<String>,
        patient: PatientId,
    ) -> Self {
        Consultation {
            id,
            scheduled_at,
            reason: reason.into(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            status: ConsultationStatus::Scheduled,
            observations: None,
            diagnosis: None,
            practitioner: practitioner.into(),
            patient,
        }
    }

    /// Builder used when importing consultations with a known duration
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Builder used when importing consultations in a known state
    pub fn with_status(mut self, status: ConsultationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> ConsultationId {
        self.id
    }

    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_at
    }

    pub fn date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// End of the slot, clamped to the last representable instant
    pub fn ends_at(&self) -> NaiveDateTime {
        slot_end(self.scheduled_at, self.duration_minutes).unwrap_or(NaiveDateTime::MAX)
    }

    pub fn status(&self) -> ConsultationStatus {
        self.status
    }

    pub fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }

    pub fn diagnosis(&self) -> Option<&str> {
        self.diagnosis.as_deref()
    }

    pub fn practitioner(&self) -> &str {
        &self.practitioner
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    /// Half-open interval overlap with `[start, start + minutes)`
    pub fn overlaps(&self, start: NaiveDateTime, minutes: u32) -> bool {
        let end = slot_end(start, minutes).unwrap_or(NaiveDateTime::MAX);
        self.scheduled_at < end && start < self.ends_at()
    }

    pub(crate) fn set_duration(&mut self, minutes: u32) {
        self.duration_minutes = minutes;
    }

    pub(crate) fn set_status(&mut self, status: ConsultationStatus) {
        self.status = status;
    }

    pub(crate) fn set_observations(&mut self, text: impl Into<String>) {
        self.observations = Some(text.into());
    }

    pub(crate) fn set_diagnosis(&mut self, text: impl Into<String>) {
        self.diagnosis = Some(text.into());
    }
}

/// `start + minutes`, or `None` past the calendar's last instant
pub fn slot_end(start: NaiveDateTime, minutes: u32) -> Option<NaiveDateTime> {
    start.checked_add_signed(Duration::minutes(i64::from(minutes)))
}
