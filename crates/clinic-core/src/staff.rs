//! Practitioner accounts: creation, login and rights management.

use crate::access::Capabilities;
use crate::error::{ClinicError, Entity, Result};
use crate::model::Practitioner;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Login-indexed practitioner accounts.
///
/// Logins of removed accounts are retired and never handed out again, so
/// a new account cannot inherit an old planning.
#[derive(Clone, Debug, Default)]
pub struct StaffRegistry {
    accounts: BTreeMap<String, Practitioner>,
    retired: BTreeSet<String>,
}

impl StaffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account; logins are unique and retired logins stay taken.
    pub fn create(&mut self, mut practitioner: Practitioner) -> Result<()> {
        let login = practitioner.login.trim().to_string();
        practitioner.login = login.clone();
        if login.is_empty() {
            return Err(ClinicError::validation("login", "must not be empty"));
        }
        validate_capabilities(practitioner.capabilities)?;
        if self.accounts.contains_key(&login) || self.retired.contains(&login) {
            warn!(%login, "login already taken");
            return Err(ClinicError::duplicate(Entity::Practitioner, login));
        }
        info!(%login, capabilities = %practitioner.capabilities, "practitioner account created");
        self.accounts.insert(login, practitioner);
        Ok(())
    }

    pub fn find(&self, login: &str) -> Option<&Practitioner> {
        self.accounts.get(login)
    }

    /// Accounts in login order
    pub fn list(&self) -> impl Iterator<Item = &Practitioner> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Check credentials of an active account.
    pub fn authenticate(&self, login: &str, password: &str) -> Result<&Practitioner> {
        let account = self
            .accounts
            .get(login)
            .ok_or_else(|| ClinicError::not_found(Entity::Practitioner, login))?;

        if !account.active || !account.password_matches(password) {
            warn!(%login, active = account.active, "login refused");
            return Err(ClinicError::Validation {
                field: "credentials",
                reason: format!("login refused for {}", login),
            });
        }
        Ok(account)
    }

    pub fn set_active(&mut self, login: &str, active: bool) -> Result<()> {
        self.get_mut(login)?.active = active;
        info!(%login, active, "account status changed");
        Ok(())
    }

    /// Replace contact details; `None` leaves a field unchanged.
    pub fn update_contact(&mut self, login: &str, email: Option<String>, phone: Option<String>) -> Result<()> {
        let account = self.get_mut(login)?;
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            account.email = Some(email);
        }
        if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
            account.phone = Some(phone);
        }
        Ok(())
    }

    pub fn set_password(&mut self, login: &str, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(ClinicError::validation("password", "must not be empty"));
        }
        self.get_mut(login)?.set_password(password);
        info!(%login, "password changed");
        Ok(())
    }

    /// Replace the rights of an account; at least one right is required.
    pub fn set_capabilities(&mut self, login: &str, capabilities: Capabilities) -> Result<()> {
        validate_capabilities(capabilities)?;
        self.get_mut(login)?.capabilities = capabilities;
        info!(%login, %capabilities, "capabilities changed");
        Ok(())
    }

    /// Delete an account and retire its login. Consultations referencing
    /// the login are kept.
    pub fn remove(&mut self, login: &str) -> Result<Practitioner> {
        let removed = self
            .accounts
            .remove(login)
            .ok_or_else(|| ClinicError::not_found(Entity::Practitioner, login))?;
        self.retired.insert(removed.login.clone());
        info!(%login, "practitioner account removed");
        Ok(removed)
    }

    /// Mark a login as used by a former account.
    ///
    /// Fails with `DuplicateKey` if a live account still holds it.
    pub fn retire(&mut self, login: &str) -> Result<()> {
        if self.accounts.contains_key(login) {
            return Err(ClinicError::duplicate(Entity::Practitioner, login));
        }
        if self.retired.insert(login.to_string()) {
            debug!(%login, "login retired");
        }
        Ok(())
    }

    pub fn is_retired(&self, login: &str) -> bool {
        self.retired.contains(login)
    }

    /// Retired logins in order
    pub fn retired(&self) -> impl Iterator<Item = &str> {
        self.retired.iter().map(String::as_str)
    }

    fn get_mut(&mut self, login: &str) -> Result<&mut Practitioner> {
        self.accounts
            .get_mut(login)
            .ok_or_else(|| ClinicError::not_found(Entity::Practitioner, login))
    }
}

/// An account without rights could not be saved and reloaded
fn validate_capabilities(capabilities: Capabilities) -> Result<()> {
    if capabilities.is_empty() {
        return Err(ClinicError::validation("capabilities", "at least one right is required"));
    }
    Ok(())
}
