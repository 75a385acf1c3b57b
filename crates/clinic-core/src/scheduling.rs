//! Scheduling Engine
//!
//! Owns every consultation (arena keyed by id, kept in insertion order) and
//! the per-practitioner planning index. Enforces:
//! - no two slot-blocking consultations of a practitioner overlap
//! - `Scheduled -> Completed | Cancelled`, nothing leaves a terminal state

use crate::error::{ClinicError, Entity, Result};
use crate::ids::{ConsultationId, IdSequence, PatientId};
use crate::model::{slot_end, Consultation, ConsultationStatus, DEFAULT_DURATION_MINUTES};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct Schedule {
    consultations: Vec<Consultation>,
    index: HashMap<ConsultationId, usize>,
    plannings: BTreeMap<String, Vec<ConsultationId>>,
    ids: IdSequence<ConsultationId>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Book a consultation with the default duration.
    ///
    /// Past dates are accepted. Fails with `Conflict` when the slot overlaps
    /// a scheduled or completed consultation of the same practitioner.
    pub fn schedule(
        &mut self,
        at: NaiveDateTime,
        reason: &str,
        practitioner: &str,
        patient: PatientId,
    ) -> Result<ConsultationId> {
        self.schedule_for(at, DEFAULT_DURATION_MINUTES, reason, practitioner, patient)
    }

    /// Book a consultation with an explicit duration in minutes.
    pub fn schedule_for(
        &mut self,
        at: NaiveDateTime,
        duration_minutes: u32,
        reason: &str,
        practitioner: &str,
        patient: PatientId,
    ) -> Result<ConsultationId> {
        validate_slot(at, duration_minutes)?;
        if practitioner.trim().is_empty() {
            return Err(ClinicError::validation("practitioner", "login must not be empty"));
        }
        self.ensure_free(practitioner, at, duration_minutes, None)?;

        let id = self.ids.next_id();
        let consultation =
            Consultation::new(id, at, reason, practitioner, patient).with_duration(duration_minutes);
        self.push(consultation);
        info!(consultation = %id, %practitioner, %patient, %at, duration_minutes, "consultation scheduled");
        Ok(id)
    }

    /// Import a consultation that already has an id (loading, bulk import).
    pub fn insert_existing(&mut self, consultation: Consultation) -> Result<ConsultationId> {
        let id = consultation.id();
        if self.index.contains_key(&id) {
            return Err(ClinicError::duplicate(Entity::Consultation, id));
        }
        validate_slot(consultation.scheduled_at(), consultation.duration_minutes())?;
        if consultation.status().blocks_slot() {
            self.ensure_free(
                consultation.practitioner(),
                consultation.scheduled_at(),
                consultation.duration_minutes(),
                None,
            )?;
        }

        self.ids.observe(id);
        self.push(consultation);
        debug!(consultation = %id, "consultation imported");
        Ok(id)
    }

    /// Change the length of a scheduled consultation, re-checking overlap.
    pub fn set_duration(&mut self, id: ConsultationId, minutes: u32) -> Result<()> {
        let current = self.require(id)?;
        if current.status() != ConsultationStatus::Scheduled {
            return Err(ClinicError::InvalidTransition {
                id,
                status: current.status(),
            });
        }
        let practitioner = current.practitioner().to_string();
        let start = current.scheduled_at();
        validate_slot(start, minutes)?;
        self.ensure_free(&practitioner, start, minutes, Some(id))?;

        self.get_mut(id)?.set_duration(minutes);
        info!(consultation = %id, minutes, "duration changed");
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn cancel(&mut self, id: ConsultationId) -> Result<()> {
        self.transition(id, ConsultationStatus::Cancelled)?;
        info!(consultation = %id, "consultation cancelled");
        Ok(())
    }

    pub fn complete(&mut self, id: ConsultationId) -> Result<()> {
        self.transition(id, ConsultationStatus::Completed)?;
        info!(consultation = %id, "consultation completed");
        Ok(())
    }

    pub fn record_observations(&mut self, id: ConsultationId, text: &str) -> Result<()> {
        self.open_mut(id)?.set_observations(text);
        debug!(consultation = %id, "observations recorded");
        Ok(())
    }

    pub fn record_diagnosis(&mut self, id: ConsultationId, text: &str) -> Result<()> {
        self.open_mut(id)?.set_diagnosis(text);
        debug!(consultation = %id, "diagnosis recorded");
        Ok(())
    }

    /// Record observations and diagnosis and complete, all or nothing.
    ///
    /// The state is checked before anything is written, so a failed close
    /// leaves the consultation exactly as it was.
    pub fn close(&mut self, id: ConsultationId, observations: &str, diagnosis: &str) -> Result<()> {
        let consultation = self.open_mut(id)?;
        consultation.set_observations(observations);
        consultation.set_diagnosis(diagnosis);
        consultation.set_status(ConsultationStatus::Completed);
        info!(consultation = %id, "consultation closed");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn find_by_id(&self, id: ConsultationId) -> Option<&Consultation> {
        self.index.get(&id).map(|&i| &self.consultations[i])
    }

    /// Every consultation, in insertion order
    pub fn list_all(&self) -> &[Consultation] {
        &self.consultations
    }

    /// Consultations starting within `[start, end]`, any status
    pub fn list_by_period(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Consultation> {
        self.consultations
            .iter()
            .filter(|c| c.scheduled_at() >= start && c.scheduled_at() <= end)
            .collect()
    }

    /// Ids in a practitioner's planning index (insertion order)
    pub fn planning(&self, practitioner: &str) -> &[ConsultationId] {
        self.plannings
            .get(practitioner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Consultations in a practitioner's planning index
    pub fn consultations_of<'a>(&'a self, practitioner: &str) -> impl Iterator<Item = &'a Consultation> + 'a {
        self.planning(practitioner)
            .iter()
            .filter_map(move |id| self.find_by_id(*id))
    }

    /// Drop cancelled consultations from a practitioner's planning index.
    ///
    /// The consultations stay in the store for history; returns how many ids
    /// were removed.
    pub fn compact_planning(&mut self, practitioner: &str) -> usize {
        let Some(ids) = self.plannings.get_mut(practitioner) else {
            return 0;
        };
        let consultations = &self.consultations;
        let index = &self.index;
        let before = ids.len();
        ids.retain(|id| {
            index
                .get(id)
                .map(|&i| consultations[i].status() != ConsultationStatus::Cancelled)
                .unwrap_or(false)
        });
        let removed = before - ids.len();
        debug!(%practitioner, removed, "planning compacted");
        removed
    }

    pub fn len(&self) -> usize {
        self.consultations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consultations.is_empty()
    }

    /// First slot-blocking consultation of `practitioner` overlapping the interval
    pub fn find_conflict(
        &self,
        practitioner: &str,
        start: NaiveDateTime,
        duration_minutes: u32,
        ignore: Option<ConsultationId>,
    ) -> Option<&Consultation> {
        self.consultations_of(practitioner).find(|c| {
            Some(c.id()) != ignore && c.status().blocks_slot() && c.overlaps(start, duration_minutes)
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_free(
        &self,
        practitioner: &str,
        start: NaiveDateTime,
        duration_minutes: u32,
        ignore: Option<ConsultationId>,
    ) -> Result<()> {
        match self.find_conflict(practitioner, start, duration_minutes, ignore) {
            Some(existing) => {
                warn!(%practitioner, %start, existing = %existing.id(), "slot conflict");
                Err(ClinicError::Conflict {
                    practitioner: practitioner.to_string(),
                    existing: existing.id(),
                })
            }
            None => Ok(()),
        }
    }

    fn push(&mut self, consultation: Consultation) {
        let id = consultation.id();
        self.plannings
            .entry(consultation.practitioner().to_string())
            .or_default()
            .push(id);
        self.index.insert(id, self.consultations.len());
        self.consultations.push(consultation);
    }

    fn require(&self, id: ConsultationId) -> Result<&Consultation> {
        self.find_by_id(id)
            .ok_or_else(|| ClinicError::not_found(Entity::Consultation, id))
    }

    fn get_mut(&mut self, id: ConsultationId) -> Result<&mut Consultation> {
        let i = *self
            .index
            .get(&id)
            .ok_or_else(|| ClinicError::not_found(Entity::Consultation, id))?;
        Ok(&mut self.consultations[i])
    }

    /// Mutable access to a consultation that is still `Scheduled`
    fn open_mut(&mut self, id: ConsultationId) -> Result<&mut Consultation> {
        let consultation = self.get_mut(id)?;
        if consultation.status().is_terminal() {
            warn!(consultation = %id, status = %consultation.status(), "consultation already terminal");
            return Err(ClinicError::InvalidTransition {
                id,
                status: consultation.status(),
            });
        }
        Ok(consultation)
    }

    fn transition(&mut self, id: ConsultationId, to: ConsultationStatus) -> Result<()> {
        self.open_mut(id)?.set_status(to);
        Ok(())
    }
}

/// Positive duration ending within the representable calendar
fn validate_slot(start: NaiveDateTime, minutes: u32) -> Result<()> {
    if minutes == 0 {
        return Err(ClinicError::validation("duration", "must be at least one minute"));
    }
    if slot_end(start, minutes).is_none() {
        return Err(ClinicError::validation(
            "date-time",
            format!("{} plus {} min is past the last supported date", start, minutes),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    const DOC: &str = "dr.martin";

    #[test]
    fn test_schedule_assigns_ids_and_defaults() {
        let mut schedule = Schedule::new();
        let a = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        let b = schedule.schedule(at("2024-01-10 10:00"), "Flu", DOC, PatientId(2)).unwrap();
        assert_eq!(a, ConsultationId(1));
        assert_eq!(b, ConsultationId(2));

        let c = schedule.find_by_id(a).unwrap();
        assert_eq!(c.status(), ConsultationStatus::Scheduled);
        assert_eq!(c.duration_minutes(), 30);
        assert_eq!(schedule.planning(DOC), &[a, b]);
    }

    #[test]
    fn test_conflict_then_adjacent_slot() {
        let mut schedule = Schedule::new();
        let first = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();

        let err = schedule
            .schedule(at("2024-01-10 09:15"), "Flu", DOC, PatientId(2))
            .unwrap_err();
        assert_eq!(
            err,
            ClinicError::Conflict {
                practitioner: DOC.to_string(),
                existing: first,
            }
        );

        assert!(schedule.schedule(at("2024-01-10 09:30"), "Flu", DOC, PatientId(2)).is_ok());
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn test_other_practitioner_not_blocked() {
        let mut schedule = Schedule::new();
        schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        assert!(schedule.schedule(at("2024-01-10 09:00"), "Checkup", "dr.lee", PatientId(1)).is_ok());
    }

    #[test]
    fn test_past_dates_accepted() {
        let mut schedule = Schedule::new();
        assert!(schedule.schedule(at("1999-12-31 23:45"), "Old", DOC, PatientId(1)).is_ok());
    }

    #[test]
    fn test_cancelled_slot_is_free_again() {
        let mut schedule = Schedule::new();
        let id = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        schedule.cancel(id).unwrap();
        assert!(schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).is_ok());
    }

    #[test]
    fn test_completed_slot_still_blocks() {
        let mut schedule = Schedule::new();
        let id = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        schedule.complete(id).unwrap();
        assert!(schedule.schedule(at("2024-01-10 09:10"), "Checkup", DOC, PatientId(2)).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut schedule = Schedule::new();
        let id = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();

        schedule.complete(id).unwrap();
        let err = schedule.complete(id).unwrap_err();
        assert_eq!(
            err,
            ClinicError::InvalidTransition {
                id,
                status: ConsultationStatus::Completed,
            }
        );
        assert!(schedule.cancel(id).is_err());
        assert!(schedule.record_observations(id, "late note").is_err());

        let other = schedule.schedule(at("2024-01-11 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        schedule.cancel(other).unwrap();
        assert!(schedule.cancel(other).is_err());
        assert!(schedule.complete(other).is_err());
    }

    #[test]
    fn test_unknown_id() {
        let mut schedule = Schedule::new();
        let missing = ConsultationId(77);
        let expected = ClinicError::not_found(Entity::Consultation, 77);
        assert_eq!(schedule.cancel(missing).unwrap_err(), expected);
        assert_eq!(schedule.complete(missing).unwrap_err(), expected);
        assert_eq!(schedule.record_diagnosis(missing, "x").unwrap_err(), expected);
        assert!(schedule.find_by_id(missing).is_none());
    }

    #[test]
    fn test_notes_do_not_change_status() {
        let mut schedule = Schedule::new();
        let id = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        schedule.record_observations(id, "BP 120/80").unwrap();
        schedule.record_diagnosis(id, "Healthy").unwrap();

        let c = schedule.find_by_id(id).unwrap();
        assert_eq!(c.status(), ConsultationStatus::Scheduled);
        assert_eq!(c.observations(), Some("BP 120/80"));
        assert_eq!(c.diagnosis(), Some("Healthy"));
    }

    #[test]
    fn test_close_is_all_or_nothing() {
        let mut schedule = Schedule::new();
        let id = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        schedule.close(id, "Lungs clear", "Common cold").unwrap();

        let c = schedule.find_by_id(id).unwrap();
        assert_eq!(c.status(), ConsultationStatus::Completed);
        assert_eq!(c.observations(), Some("Lungs clear"));
        assert_eq!(c.diagnosis(), Some("Common cold"));

        // Second close fails and leaves the texts untouched
        assert!(schedule.close(id, "changed", "changed").is_err());
        let c = schedule.find_by_id(id).unwrap();
        assert_eq!(c.observations(), Some("Lungs clear"));
    }

    #[test]
    fn test_set_duration_rechecks_overlap() {
        let mut schedule = Schedule::new();
        let first = schedule.schedule(at("2024-01-10 09:00"), "Checkup", DOC, PatientId(1)).unwrap();
        let second = schedule.schedule(at("2024-01-10 09:45"), "Checkup", DOC, PatientId(2)).unwrap();

        // Growing into its own slot is fine
        schedule.set_duration(first, 45).unwrap();
        let err = schedule.set_duration(first, 60).unwrap_err();
        assert_eq!(
            err,
            ClinicError::Conflict {
                practitioner: DOC.to_string(),
                existing: second,
            }
        );
        assert_eq!(schedule.find_by_id(first).unwrap().duration_minutes(), 45);
        assert!(schedule.set_duration(first, 0).is_err());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut schedule = Schedule::new();
        let err = schedule
            .schedule_for(at("2024-01-10 09:00"), 0, "Checkup", DOC, PatientId(1))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation { field: "duration", .. }));
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_slot_past_calendar_end_rejected() {
        let mut schedule = Schedule::new();
        let late = NaiveDate::MAX.and_hms_opt(23, 40, 0).unwrap();

        let id = schedule.schedule_for(late, 10, "Last call", DOC, PatientId(1)).unwrap();
        let err = schedule.schedule(late, "Overflow", DOC, PatientId(2)).unwrap_err();
        assert!(matches!(err, ClinicError::Validation { field: "date-time", .. }));

        // Conflict checks near the limit still answer instead of failing
        assert!(schedule.find_conflict(DOC, late, 10, None).is_some());
        assert!(matches!(
            schedule.schedule_for(late, 5, "Clash", DOC, PatientId(2)),
            Err(ClinicError::Conflict { .. })
        ));

        assert!(matches!(
            schedule.set_duration(id, 30),
            Err(ClinicError::Validation { field: "date-time", .. })
        ));
        assert_eq!(schedule.find_by_id(id).unwrap().duration_minutes(), 10);

        let imported = Consultation::new(ConsultationId(9), late, "x", "dr.lee", PatientId(1)).with_duration(60);
        assert!(matches!(
            schedule.insert_existing(imported),
            Err(ClinicError::Validation { field: "date-time", .. })
        ));
    }

    #[test]
    fn test_insert_existing() {
        let mut schedule = Schedule::new();
        let imported = Consultation::new(ConsultationId(40), at("2024-02-01 14:00"), "Follow-up", DOC, PatientId(3))
            .with_duration(20)
            .with_status(ConsultationStatus::Completed);
        schedule.insert_existing(imported.clone()).unwrap();

        assert_eq!(
            schedule.insert_existing(imported).unwrap_err(),
            ClinicError::duplicate(Entity::Consultation, 40)
        );

        // Sequence continues after the imported id
        let next = schedule.schedule(at("2024-02-01 15:00"), "New", DOC, PatientId(3)).unwrap();
        assert_eq!(next, ConsultationId(41));

        // Imported completed consultation still blocks its slot
        assert!(schedule.schedule(at("2024-02-01 14:10"), "New", DOC, PatientId(3)).is_err());

        // Cancelled imports never conflict
        let cancelled = Consultation::new(ConsultationId(50), at("2024-02-01 14:00"), "x", DOC, PatientId(3))
            .with_status(ConsultationStatus::Cancelled);
        assert!(schedule.insert_existing(cancelled).is_ok());
    }

    #[test]
    fn test_list_by_period_inclusive_any_status() {
        let mut schedule = Schedule::new();
        let a = schedule.schedule(at("2024-01-10 09:00"), "a", DOC, PatientId(1)).unwrap();
        let b = schedule.schedule(at("2024-01-11 09:00"), "b", DOC, PatientId(1)).unwrap();
        schedule.schedule(at("2024-01-12 09:00"), "c", DOC, PatientId(1)).unwrap();
        schedule.cancel(b).unwrap();

        let ids: Vec<_> = schedule
            .list_by_period(at("2024-01-10 09:00"), at("2024-01-11 09:00"))
            .into_iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_compact_planning_keeps_history() {
        let mut schedule = Schedule::new();
        let a = schedule.schedule(at("2024-01-10 09:00"), "a", DOC, PatientId(1)).unwrap();
        let b = schedule.schedule(at("2024-01-10 10:00"), "b", DOC, PatientId(1)).unwrap();
        schedule.cancel(a).unwrap();

        assert_eq!(schedule.compact_planning(DOC), 1);
        assert_eq!(schedule.planning(DOC), &[b]);
        assert_eq!(schedule.find_by_id(a).unwrap().status(), ConsultationStatus::Cancelled);
        assert_eq!(schedule.list_all().len(), 2);
        assert_eq!(schedule.compact_planning("nobody"), 0);
    }
}
