//! Office facade.
//!
//! Bundles the patient directory, the staff registry and the scheduling
//! engine. Every menu operation names the acting practitioner; the account
//! must exist, be active and hold the capability for the action before
//! anything is delegated.

use crate::access::Action;
use crate::directory::{ConditionUpdate, PatientDirectory, PatientUpdate};
use crate::error::{ClinicError, Entity, Result};
use crate::ids::{ConditionId, ConsultationId, PatientId};
use crate::model::{Condition, Consultation, NewCondition, NewPatient, Patient, Practitioner, DEFAULT_DURATION_MINUTES};
use crate::planning::{self, ClinicStats};
use crate::scheduling::Schedule;
use crate::staff::StaffRegistry;
use crate::store::Snapshot;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

/// A patient together with the consultations linked to their record
#[derive(Debug)]
pub struct PatientHistory<'a> {
    pub patient: &'a Patient,
    pub consultations: Vec<&'a Consultation>,
}

#[derive(Clone, Debug)]
pub struct Clinic {
    directory: PatientDirectory,
    staff: StaffRegistry,
    schedule: Schedule,
    default_duration: u32,
}

impl Default for Clinic {
    fn default() -> Self {
        Clinic {
            directory: PatientDirectory::new(),
            staff: StaffRegistry::new(),
            schedule: Schedule::new(),
            default_duration: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl Clinic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration used by [`schedule`](Self::schedule) when none is given
    pub fn with_default_duration(mut self, minutes: u32) -> Self {
        self.default_duration = minutes;
        self
    }

    pub fn directory(&self) -> &PatientDirectory {
        &self.directory
    }

    pub fn engine(&self) -> &Schedule {
        &self.schedule
    }

    pub fn staff(&self) -> &StaffRegistry {
        &self.staff
    }

    /// Account administration; callers are responsible for admin checks.
    pub fn staff_mut(&mut self) -> &mut StaffRegistry {
        &mut self.staff
    }

    fn authorize(&self, login: &str, action: Action) -> Result<&Practitioner> {
        match self.staff.find(login) {
            Some(account) if account.active && account.capabilities.allows(action) => Ok(account),
            _ => {
                warn!(%login, %action, "action refused");
                Err(ClinicError::Unauthorized {
                    login: login.to_string(),
                    action,
                })
            }
        }
    }

    // ========================================================================
    // Patient management (1)
    // ========================================================================

    pub fn create_patient(&mut self, actor: &str, patient: NewPatient) -> Result<PatientId> {
        self.authorize(actor, Action::PatientManagement)?;
        self.directory.create(patient)
    }

    pub fn update_patient(&mut self, actor: &str, id: PatientId, update: PatientUpdate) -> Result<()> {
        self.authorize(actor, Action::PatientManagement)?;
        self.directory.update(id, update)
    }

    pub fn patient(&self, actor: &str, id: PatientId) -> Result<&Patient> {
        self.authorize(actor, Action::PatientManagement)?;
        self.directory
            .find_by_id(id)
            .ok_or_else(|| ClinicError::not_found(Entity::Patient, id))
    }

    pub fn patients(&self, actor: &str) -> Result<Vec<&Patient>> {
        self.authorize(actor, Action::PatientManagement)?;
        Ok(self.directory.list().collect())
    }

    /// Id suggested for the next patient
    pub fn next_patient_id(&self, actor: &str) -> Result<PatientId> {
        self.authorize(actor, Action::PatientManagement)?;
        Ok(self.directory.next_id())
    }

    // ========================================================================
    // Scheduling (2)
    // ========================================================================

    /// Book `practitioner` for `patient` and link the consultation into the
    /// patient's record.
    pub fn schedule(
        &mut self,
        actor: &str,
        at: NaiveDateTime,
        reason: &str,
        practitioner: &str,
        patient: PatientId,
        duration_minutes: Option<u32>,
    ) -> Result<ConsultationId> {
        self.authorize(actor, Action::Scheduling)?;
        if self.staff.find(practitioner).is_none() {
            return Err(ClinicError::not_found(Entity::Practitioner, practitioner));
        }
        if self.directory.find_by_id(patient).is_none() {
            return Err(ClinicError::not_found(Entity::Patient, patient));
        }

        let duration = duration_minutes.unwrap_or(self.default_duration);
        let id = self
            .schedule
            .schedule_for(at, duration, reason, practitioner, patient)?;
        self.directory.link_consultation(patient, id)?;
        Ok(id)
    }

    /// Cancel one of the actor's own consultations.
    pub fn cancel(&mut self, actor: &str, id: ConsultationId) -> Result<()> {
        self.authorize_owner(actor, id, "cancel")?;
        self.schedule.cancel(id)
    }

    /// Resize one of the actor's own consultations.
    pub fn set_duration(&mut self, actor: &str, id: ConsultationId, minutes: u32) -> Result<()> {
        self.authorize_owner(actor, id, "resize")?;
        self.schedule.set_duration(id, minutes)
    }

    /// Scheduling right plus ownership of the consultation
    fn authorize_owner(&self, actor: &str, id: ConsultationId, operation: &str) -> Result<()> {
        self.authorize(actor, Action::Scheduling)?;
        let consultation = self
            .schedule
            .find_by_id(id)
            .ok_or_else(|| ClinicError::not_found(Entity::Consultation, id))?;
        if consultation.practitioner() != actor {
            warn!(%actor, consultation = %id, owner = %consultation.practitioner(), %operation, "refused, not the owner");
            return Err(ClinicError::Unauthorized {
                login: actor.to_string(),
                action: Action::Scheduling,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Planning view (3), always the actor's own planning
    // ========================================================================

    pub fn day_view(&self, actor: &str, date: NaiveDate) -> Result<Vec<&Consultation>> {
        self.authorize(actor, Action::PlanningView)?;
        Ok(planning::day_view(&self.schedule, actor, date))
    }

    pub fn week_view(&self, actor: &str, week_start: NaiveDate) -> Result<Vec<&Consultation>> {
        self.authorize(actor, Action::PlanningView)?;
        planning::week_view(&self.schedule, actor, week_start)
    }

    pub fn month_view(&self, actor: &str, year: i32, month: u32) -> Result<Vec<&Consultation>> {
        self.authorize(actor, Action::PlanningView)?;
        planning::month_view(&self.schedule, actor, year, month)
    }

    pub fn range_view(&self, actor: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<&Consultation>> {
        self.authorize(actor, Action::PlanningView)?;
        Ok(planning::range_view(&self.schedule, actor, start, end))
    }

    pub fn full_view(&self, actor: &str) -> Result<Vec<&Consultation>> {
        self.authorize(actor, Action::PlanningView)?;
        Ok(planning::full_view(&self.schedule, actor))
    }

    // ========================================================================
    // Close consultation (4)
    // ========================================================================

    pub fn close(&mut self, actor: &str, id: ConsultationId, observations: &str, diagnosis: &str) -> Result<()> {
        self.authorize(actor, Action::CloseConsultation)?;
        self.schedule.close(id, observations, diagnosis)
    }

    pub fn record_observations(&mut self, actor: &str, id: ConsultationId, text: &str) -> Result<()> {
        self.authorize(actor, Action::CloseConsultation)?;
        self.schedule.record_observations(id, text)
    }

    pub fn record_diagnosis(&mut self, actor: &str, id: ConsultationId, text: &str) -> Result<()> {
        self.authorize(actor, Action::CloseConsultation)?;
        self.schedule.record_diagnosis(id, text)
    }

    pub fn complete(&mut self, actor: &str, id: ConsultationId) -> Result<()> {
        self.authorize(actor, Action::CloseConsultation)?;
        self.schedule.complete(id)
    }

    // ========================================================================
    // Condition management (5)
    // ========================================================================

    pub fn add_condition(&mut self, actor: &str, patient: PatientId, condition: NewCondition) -> Result<ConditionId> {
        self.authorize(actor, Action::ConditionManagement)?;
        self.directory.add_condition(patient, condition)
    }

    /// Conditions of a patient; empty for unknown ids.
    pub fn conditions(&self, actor: &str, patient: PatientId) -> Result<&[Condition]> {
        self.authorize(actor, Action::ConditionManagement)?;
        Ok(self.directory.list_conditions(patient))
    }

    pub fn update_condition(
        &mut self,
        actor: &str,
        patient: PatientId,
        condition: ConditionId,
        update: ConditionUpdate,
    ) -> Result<()> {
        self.authorize(actor, Action::ConditionManagement)?;
        self.directory.update_condition(patient, condition, update)
    }

    /// Patient record with its consultations in booking order
    pub fn history(&self, actor: &str, patient: PatientId) -> Result<PatientHistory<'_>> {
        self.authorize(actor, Action::ConditionManagement)?;
        let patient = self
            .directory
            .find_by_id(patient)
            .ok_or_else(|| ClinicError::not_found(Entity::Patient, patient))?;
        let consultations = patient
            .record()
            .consultations()
            .iter()
            .filter_map(|id| self.schedule.find_by_id(*id))
            .collect();
        Ok(PatientHistory { patient, consultations })
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub fn stats(&self) -> ClinicStats {
        ClinicStats::collect(self.directory.len(), &self.staff, &self.schedule)
    }

    /// Rebuild an office from its saved form.
    ///
    /// Consultations are relinked into plannings and patient records in
    /// snapshot order. A consultation naming an unknown patient, a reused id
    /// or an overlapping slot makes the whole load fail. Unknown practitioner
    /// logins are kept, since removed accounts leave their history behind,
    /// and are retired so no new account can take them over.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut clinic = Clinic::new();
        for login in &snapshot.retired_logins {
            clinic.staff.retire(login)?;
        }
        for practitioner in snapshot.practitioners {
            clinic.staff.create(practitioner)?;
        }
        for patient in snapshot.patients {
            clinic.directory.restore(patient)?;
        }
        clinic.directory.clear_consultation_links();

        for consultation in snapshot.consultations {
            let patient = consultation.patient();
            if clinic.directory.find_by_id(patient).is_none() {
                return Err(ClinicError::not_found(Entity::Patient, patient));
            }
            if clinic.staff.find(consultation.practitioner()).is_none() {
                clinic.staff.retire(consultation.practitioner())?;
            }
            let id = clinic.schedule.insert_existing(consultation)?;
            clinic.directory.relink_consultation(patient, id)?;
        }
        info!(
            practitioners = clinic.staff.len(),
            patients = clinic.directory.len(),
            consultations = clinic.schedule.len(),
            "clinic loaded"
        );
        Ok(clinic)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            practitioners: self.staff.list().cloned().collect(),
            patients: self.directory.list().cloned().collect(),
            consultations: self.schedule.list_all().to_vec(),
            retired_logins: self.staff.retired().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConsultationStatus, Sex};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    /// Office with a full-rights doctor, a secretary (1,2) and one patient
    fn create_test_clinic() -> Clinic {
        let mut clinic = Clinic::new();
        clinic
            .staff_mut()
            .create(Practitioner::new("dr.martin", "pw", "Paul", "Martin", "GP", "12345".parse().unwrap()))
            .unwrap();
        clinic
            .staff_mut()
            .create(Practitioner::new("desk", "pw", "Ana", "Silva", "Reception", "21".parse().unwrap()))
            .unwrap();
        clinic
            .create_patient("desk", NewPatient::new(PatientId(1), "Jane", "Doe", Sex::Female))
            .unwrap();
        clinic
    }

    #[test]
    fn test_capability_gates_actions() {
        let mut clinic = create_test_clinic();
        let id = clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), None)
            .unwrap();

        let err = clinic.close("desk", id, "obs", "diag").unwrap_err();
        assert_eq!(
            err,
            ClinicError::Unauthorized {
                login: "desk".to_string(),
                action: Action::CloseConsultation,
            }
        );
        assert!(clinic.conditions("desk", PatientId(1)).is_err());
        assert!(clinic.day_view("desk", at("2024-01-10 00:00").date()).is_err());

        clinic.close("dr.martin", id, "obs", "diag").unwrap();
        assert_eq!(clinic.engine().find_by_id(id).unwrap().status(), ConsultationStatus::Completed);
    }

    #[test]
    fn test_unknown_or_inactive_actor_refused() {
        let mut clinic = create_test_clinic();
        assert!(clinic.patients("ghost").is_err());

        clinic.staff_mut().set_active("dr.martin", false).unwrap();
        assert!(matches!(
            clinic.patients("dr.martin"),
            Err(ClinicError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_schedule_links_patient_record() {
        let mut clinic = create_test_clinic();
        let id = clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), Some(45))
            .unwrap();

        let patient = clinic.patient("desk", PatientId(1)).unwrap();
        assert_eq!(patient.record().consultations(), &[id]);
        assert_eq!(clinic.engine().find_by_id(id).unwrap().duration_minutes(), 45);

        let history = clinic.history("dr.martin", PatientId(1)).unwrap();
        assert_eq!(history.consultations.len(), 1);
        assert_eq!(history.consultations[0].reason(), "Checkup");
    }

    #[test]
    fn test_schedule_requires_known_parties() {
        let mut clinic = create_test_clinic();
        assert_eq!(
            clinic
                .schedule("desk", at("2024-01-10 09:00"), "x", "dr.who", PatientId(1), None)
                .unwrap_err(),
            ClinicError::not_found(Entity::Practitioner, "dr.who")
        );
        assert_eq!(
            clinic
                .schedule("desk", at("2024-01-10 09:00"), "x", "dr.martin", PatientId(9), None)
                .unwrap_err(),
            ClinicError::not_found(Entity::Patient, 9)
        );
        assert!(clinic.engine().is_empty());
    }

    #[test]
    fn test_only_owner_cancels() {
        let mut clinic = create_test_clinic();
        let id = clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), None)
            .unwrap();

        assert!(matches!(
            clinic.cancel("desk", id),
            Err(ClinicError::Unauthorized { .. })
        ));
        clinic.cancel("dr.martin", id).unwrap();
        assert!(clinic.day_view("dr.martin", at("2024-01-10 00:00").date()).unwrap().is_empty());
    }

    #[test]
    fn test_only_owner_resizes() {
        let mut clinic = create_test_clinic();
        let id = clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), None)
            .unwrap();

        assert!(matches!(
            clinic.set_duration("desk", id, 90),
            Err(ClinicError::Unauthorized { .. })
        ));
        assert_eq!(clinic.engine().find_by_id(id).unwrap().duration_minutes(), 30);

        clinic.set_duration("dr.martin", id, 45).unwrap();
        assert_eq!(clinic.engine().find_by_id(id).unwrap().duration_minutes(), 45);
        assert_eq!(
            clinic.set_duration("dr.martin", ConsultationId(99), 45).unwrap_err(),
            ClinicError::not_found(Entity::Consultation, 99)
        );
    }

    #[test]
    fn test_default_duration_applies() {
        let mut clinic = create_test_clinic().with_default_duration(15);
        let id = clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), None)
            .unwrap();
        assert_eq!(clinic.engine().find_by_id(id).unwrap().duration_minutes(), 15);
        assert!(clinic
            .schedule("desk", at("2024-01-10 09:15"), "Next", "dr.martin", PatientId(1), None)
            .is_ok());
    }

    #[test]
    fn test_snapshot_round_trip_relinks() {
        let mut clinic = create_test_clinic();
        let a = clinic
            .schedule("desk", at("2024-01-10 09:00"), "a", "dr.martin", PatientId(1), None)
            .unwrap();
        let b = clinic
            .schedule("desk", at("2024-01-10 10:00"), "b", "dr.martin", PatientId(1), None)
            .unwrap();
        clinic.cancel("dr.martin", a).unwrap();
        clinic
            .add_condition("dr.martin", PatientId(1), NewCondition::new("allergy", "Penicillin", at("2020-05-01 00:00").date()))
            .unwrap();

        let restored = Clinic::from_snapshot(clinic.snapshot()).unwrap();
        assert_eq!(restored.snapshot(), clinic.snapshot());
        assert_eq!(restored.engine().planning("dr.martin"), &[a, b]);
        assert_eq!(
            restored.directory().find_by_id(PatientId(1)).unwrap().record().consultations(),
            &[a, b]
        );

        // Sequences continue where the saved office stopped
        let mut restored = restored;
        let next = restored
            .schedule("desk", at("2024-01-11 09:00"), "c", "dr.martin", PatientId(1), None)
            .unwrap();
        assert_eq!(next, ConsultationId(3));
    }

    #[test]
    fn test_removed_login_keeps_planning_out_of_reach() {
        let mut clinic = create_test_clinic();
        clinic
            .staff_mut()
            .create(Practitioner::new("dr.x", "pw", "Xavier", "Roy", "GP", "123".parse().unwrap()))
            .unwrap();
        clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.x", PatientId(1), None)
            .unwrap();
        clinic.staff_mut().remove("dr.x").unwrap();

        let comeback = Practitioner::new("dr.x", "other", "Xena", "Roy", "GP", "123".parse().unwrap());
        assert_eq!(
            clinic.staff_mut().create(comeback.clone()).unwrap_err(),
            ClinicError::duplicate(Entity::Practitioner, "dr.x")
        );
        assert!(clinic.day_view("dr.x", at("2024-01-10 00:00").date()).is_err());

        // The tombstone survives a reload
        let mut restored = Clinic::from_snapshot(clinic.snapshot()).unwrap();
        assert_eq!(restored.snapshot().retired_logins, vec!["dr.x".to_string()]);
        assert!(restored.staff_mut().create(comeback).is_err());
    }

    #[test]
    fn test_snapshot_retires_orphan_logins() {
        let mut clinic = create_test_clinic();
        clinic
            .schedule("desk", at("2024-01-10 09:00"), "Checkup", "dr.martin", PatientId(1), None)
            .unwrap();
        let mut snapshot = clinic.snapshot();
        snapshot.practitioners.retain(|p| p.login != "dr.martin");
        assert!(snapshot.retired_logins.is_empty());

        let mut restored = Clinic::from_snapshot(snapshot).unwrap();
        assert!(restored.staff().is_retired("dr.martin"));
        assert!(restored
            .staff_mut()
            .create(Practitioner::new("dr.martin", "pw", "Paul", "Martin", "GP", "1".parse().unwrap()))
            .is_err());
    }

    #[test]
    fn test_snapshot_with_live_retired_login_fails() {
        let mut snapshot = create_test_clinic().snapshot();
        snapshot.retired_logins.push("desk".to_string());
        assert_eq!(
            Clinic::from_snapshot(snapshot).unwrap_err(),
            ClinicError::duplicate(Entity::Practitioner, "desk")
        );
    }

    #[test]
    fn test_snapshot_with_unknown_patient_fails() {
        let mut snapshot = create_test_clinic().snapshot();
        snapshot.consultations.push(Consultation::new(
            ConsultationId(1),
            at("2024-01-10 09:00"),
            "x",
            "dr.martin",
            PatientId(42),
        ));
        assert_eq!(
            Clinic::from_snapshot(snapshot).unwrap_err(),
            ClinicError::not_found(Entity::Patient, 42)
        );
    }
}
