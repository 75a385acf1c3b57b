//! Capability-code authorization
//!
//! Every practitioner account carries a short digit string, one digit per
//! menu action it may perform:
//!
//! | digit | action                |
//! |-------|-----------------------|
//! | `1`   | patient management    |
//! | `2`   | scheduling            |
//! | `3`   | planning view         |
//! | `4`   | closing consultations |
//! | `5`   | condition management  |
//!
//! Codes are parsed once into [`Capabilities`], which rejects anything
//! malformed; checks afterwards are plain bit tests.

use crate::error::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest meaningful capability code
pub const MAX_CODE_LEN: usize = 5;

/// Menu-level action guarded by a capability digit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    PatientManagement,
    Scheduling,
    PlanningView,
    CloseConsultation,
    ConditionManagement,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::PatientManagement,
        Action::Scheduling,
        Action::PlanningView,
        Action::CloseConsultation,
        Action::ConditionManagement,
    ];

    /// Digit representing this action in a capability code
    pub fn digit(self) -> char {
        match self {
            Action::PatientManagement => '1',
            Action::Scheduling => '2',
            Action::PlanningView => '3',
            Action::CloseConsultation => '4',
            Action::ConditionManagement => '5',
        }
    }

    pub fn from_digit(digit: char) -> Option<Self> {
        Action::ALL.into_iter().find(|a| a.digit() == digit)
    }

    fn bit(self) -> u8 {
        match self {
            Action::PatientManagement => 0b00001,
            Action::Scheduling => 0b00010,
            Action::PlanningView => 0b00100,
            Action::CloseConsultation => 0b01000,
            Action::ConditionManagement => 0b10000,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::PatientManagement => "patient management",
            Action::Scheduling => "scheduling",
            Action::PlanningView => "planning view",
            Action::CloseConsultation => "closing consultations",
            Action::ConditionManagement => "condition management",
        };
        f.pad(name)
    }
}

/// Membership test on a raw capability code.
///
/// Only checks whether the action's digit appears anywhere in `code`; the
/// code itself is not validated here.
pub fn is_authorized(code: &str, action: Action) -> bool {
    code.contains(action.digit())
}

/// Validated set of actions granted to an account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capabilities(u8);

impl Capabilities {
    pub fn empty() -> Self {
        Capabilities(0)
    }

    pub fn all() -> Self {
        Self::from_actions(Action::ALL)
    }

    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut caps = Capabilities::empty();
        for action in actions {
            caps.grant(action);
        }
        caps
    }

    pub fn allows(&self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn grant(&mut self, action: Action) {
        self.0 |= action.bit();
    }

    pub fn revoke(&mut self, action: Action) {
        self.0 &= !action.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Granted actions in digit order
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(move |a| self.allows(*a))
    }

    /// Canonical code: granted digits in ascending order
    pub fn code(&self) -> String {
        self.actions().map(Action::digit).collect()
    }
}

impl FromStr for Capabilities {
    type Err = ClinicError;

    fn from_str(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ClinicError::validation("capability code", "empty"));
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(ClinicError::validation(
                "capability code",
                format!("longer than {} digits", MAX_CODE_LEN),
            ));
        }

        let mut caps = Capabilities::empty();
        for c in code.chars() {
            let action = Action::from_digit(c).ok_or_else(|| {
                ClinicError::validation("capability code", format!("unknown action digit '{}'", c))
            })?;
            caps.grant(action);
        }
        Ok(caps)
    }
}

impl TryFrom<String> for Capabilities {
    type Error = ClinicError;

    fn try_from(code: String) -> Result<Self> {
        code.parse()
    }
}

impl From<Capabilities> for String {
    fn from(caps: Capabilities) -> Self {
        caps.code()
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.code())
    }
}
