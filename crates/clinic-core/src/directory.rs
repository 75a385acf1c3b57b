//! Patient/Record Directory
//!
//! Id-indexed store of patients. Creating a patient also creates its
//! medical record; conditions and consultation links are appended to that
//! record and bump its last-modified timestamp.

use crate::error::{ClinicError, Entity, Result};
use crate::ids::{ConditionId, ConsultationId, IdSequence, PatientId, RecordId};
use crate::model::{Condition, MedicalRecord, NewCondition, NewPatient, Patient, Severity};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// First medical record number handed out
pub const FIRST_RECORD_ID: u32 = 5000;

/// Partial update of patient demographics.
///
/// `None` or blank values leave the stored field unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub blood_group: Option<String>,
}

/// Changes allowed on an existing condition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConditionUpdate {
    pub severity: Option<Severity>,
    pub active: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct PatientDirectory {
    patients: BTreeMap<PatientId, Patient>,
    record_ids: IdSequence<RecordId>,
    condition_ids: IdSequence<ConditionId>,
}

impl Default for PatientDirectory {
    fn default() -> Self {
        PatientDirectory {
            patients: BTreeMap::new(),
            record_ids: IdSequence::starting_at(FIRST_RECORD_ID),
            condition_ids: IdSequence::default(),
        }
    }
}

impl PatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient and open its medical record.
    ///
    /// Fails with `DuplicateKey` when the id is taken; the existing patient
    /// is left untouched.
    pub fn create(&mut self, new: NewPatient) -> Result<PatientId> {
        if self.patients.contains_key(&new.id) {
            warn!(patient = %new.id, "patient id already in use");
            return Err(ClinicError::duplicate(Entity::Patient, new.id));
        }
        if new.name.trim().is_empty() || new.surname.trim().is_empty() {
            return Err(ClinicError::validation("patient name", "name and surname are required"));
        }

        let id = new.id;
        let record = MedicalRecord::new(self.record_ids.next_id(), now());
        let patient = Patient::from_new(new, record);
        info!(patient = %id, record = %patient.record().id(), "patient created");
        self.patients.insert(id, patient);
        Ok(id)
    }

    /// Re-insert a previously saved patient with its record as-is.
    pub fn restore(&mut self, patient: Patient) -> Result<()> {
        if self.patients.contains_key(&patient.id) {
            return Err(ClinicError::duplicate(Entity::Patient, patient.id));
        }
        self.record_ids.observe(patient.record().id());
        for condition in patient.record().conditions() {
            self.condition_ids.observe(condition.id());
        }
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    pub fn find_by_id(&self, id: PatientId) -> Option<&Patient> {
        self.patients.get(&id)
    }

    /// All patients in ascending id order
    pub fn list(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// Id following the highest one in use (1 for an empty directory)
    pub fn next_id(&self) -> PatientId {
        self.patients
            .keys()
            .next_back()
            .map(|last| PatientId(last.0 + 1))
            .unwrap_or(PatientId(1))
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn update(&mut self, id: PatientId, update: PatientUpdate) -> Result<()> {
        let patient = self.get_mut(id)?;

        if let Some(name) = non_blank(update.name) {
            patient.name = name;
        }
        if let Some(surname) = non_blank(update.surname) {
            patient.surname = surname;
        }
        if let Some(date) = update.birth_date {
            patient.birth_date = Some(date);
        }
        if let Some(group) = non_blank(update.blood_group) {
            patient.blood_group = Some(group);
        }
        info!(patient = %id, "patient updated");
        Ok(())
    }

    /// Append a condition to the patient's record.
    pub fn add_condition(&mut self, patient_id: PatientId, new: NewCondition) -> Result<ConditionId> {
        if !self.patients.contains_key(&patient_id) {
            return Err(ClinicError::not_found(Entity::Patient, patient_id));
        }
        let id = self.condition_ids.next_id();
        let patient = self.get_mut(patient_id)?;
        patient
            .record_mut()
            .add_condition(Condition::from_new(id, new), now());
        info!(patient = %patient_id, condition = %id, "condition recorded");
        Ok(id)
    }

    /// Conditions of a patient; empty for unknown ids.
    pub fn list_conditions(&self, patient_id: PatientId) -> &[Condition] {
        debug!(patient = %patient_id, "listing conditions");
        self.patients
            .get(&patient_id)
            .map(|p| p.record().conditions())
            .unwrap_or(&[])
    }

    pub fn update_condition(
        &mut self,
        patient_id: PatientId,
        condition_id: ConditionId,
        update: ConditionUpdate,
    ) -> Result<()> {
        let record = self.get_mut(patient_id)?.record_mut();
        let condition = record
            .condition_mut(condition_id)
            .ok_or_else(|| ClinicError::not_found(Entity::Condition, condition_id))?;

        if let Some(severity) = update.severity {
            condition.set_severity(severity);
        }
        if let Some(active) = update.active {
            condition.set_active(active);
        }
        record.touch(now());
        info!(patient = %patient_id, condition = %condition_id, "condition updated");
        Ok(())
    }

    /// Add a consultation to the patient's history.
    pub fn link_consultation(&mut self, patient_id: PatientId, consultation: ConsultationId) -> Result<()> {
        let patient = self.get_mut(patient_id)?;
        patient.record_mut().link_consultation(consultation, now());
        Ok(())
    }

    /// Rebuild a link while loading a snapshot, without touching the record.
    pub(crate) fn relink_consultation(&mut self, patient_id: PatientId, consultation: ConsultationId) -> Result<()> {
        self.get_mut(patient_id)?
            .record_mut()
            .relink_consultation(consultation);
        Ok(())
    }

    pub(crate) fn clear_consultation_links(&mut self) {
        for patient in self.patients.values_mut() {
            patient.record_mut().clear_consultations();
        }
    }

    fn get_mut(&mut self, id: PatientId) -> Result<&mut Patient> {
        self.patients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::not_found(Entity::Patient, id))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
