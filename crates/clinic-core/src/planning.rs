//! Planning Query Service
//!
//! Read-only calendar views over a practitioner's planning plus the
//! aggregate counters behind the statistics screen.
//!
//! Views:
//! - exclude cancelled consultations
//! - are sorted by start time
//! - use inclusive date bounds

use crate::error::{ClinicError, Result};
use crate::model::{Consultation, ConsultationStatus};
use crate::scheduling::Schedule;
use crate::staff::StaffRegistry;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Consultations of `login` on `date`
pub fn day_view<'a>(schedule: &'a Schedule, login: &str, date: NaiveDate) -> Vec<&'a Consultation> {
    range_view(schedule, login, date, date)
}

/// Seven days starting at `week_start`.
///
/// Fails with `Validation` on `date-time` when the week runs past the last
/// representable date.
pub fn week_view<'a>(
    schedule: &'a Schedule,
    login: &str,
    week_start: NaiveDate,
) -> Result<Vec<&'a Consultation>> {
    let week_end = week_start.checked_add_signed(Duration::days(6)).ok_or_else(|| {
        ClinicError::validation("date-time", format!("week of {} is past the last supported date", week_start))
    })?;
    Ok(range_view(schedule, login, week_start, week_end))
}

/// Whole calendar month; `month` is 1-based.
pub fn month_view<'a>(
    schedule: &'a Schedule,
    login: &str,
    year: i32,
    month: u32,
) -> Result<Vec<&'a Consultation>> {
    let (first, last) = month_bounds(year, month)?;
    Ok(range_view(schedule, login, first, last))
}

/// Consultations whose start date lies in `[start, end]`
pub fn range_view<'a>(
    schedule: &'a Schedule,
    login: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<&'a Consultation> {
    debug!(%login, %start, %end, "planning view");
    collect_sorted(
        schedule
            .consultations_of(login)
            .filter(|c| c.date() >= start && c.date() <= end),
    )
}

/// Every non-cancelled consultation of `login`
pub fn full_view<'a>(schedule: &'a Schedule, login: &str) -> Vec<&'a Consultation> {
    collect_sorted(schedule.consultations_of(login))
}

fn collect_sorted<'a>(consultations: impl Iterator<Item = &'a Consultation>) -> Vec<&'a Consultation> {
    let mut view: Vec<_> = consultations
        .filter(|c| c.status() != ConsultationStatus::Cancelled)
        .collect();
    view.sort_by_key(|c| (c.scheduled_at(), c.id()));
    view
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || ClinicError::validation("month", format!("{}-{} is not a calendar month", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    // Longest valid day of the month; avoids stepping into the following year
    let last = (28..=31)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .ok_or_else(invalid)?;
    Ok((first, last))
}

// ============================================================================
// Aggregates
// ============================================================================

/// Consultation counts per status, every status included
pub fn count_by_status<'a>(
    consultations: impl IntoIterator<Item = &'a Consultation>,
) -> BTreeMap<ConsultationStatus, usize> {
    let mut counts = BTreeMap::new();
    for c in consultations {
        *counts.entry(c.status()).or_insert(0) += 1;
    }
    counts
}

/// Consultation counts keyed by practitioner full name.
///
/// Logins without an account (removed staff) are reported as the raw login.
pub fn count_by_practitioner<'a>(
    consultations: impl IntoIterator<Item = &'a Consultation>,
    staff: &StaffRegistry,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for c in consultations {
        let key = staff
            .find(c.practitioner())
            .map(|p| p.full_name())
            .unwrap_or_else(|| c.practitioner().to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Totals shown on the administrator statistics screen
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClinicStats {
    pub patients: usize,
    pub practitioners: usize,
    pub consultations: usize,
    pub by_status: BTreeMap<ConsultationStatus, usize>,
    pub by_practitioner: BTreeMap<String, usize>,
}

impl ClinicStats {
    pub fn collect(patients: usize, staff: &StaffRegistry, schedule: &Schedule) -> Self {
        ClinicStats {
            patients,
            practitioners: staff.len(),
            consultations: schedule.len(),
            by_status: count_by_status(schedule.list_all()),
            by_practitioner: count_by_practitioner(schedule.list_all(), staff),
        }
    }

    pub fn count(&self, status: ConsultationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
