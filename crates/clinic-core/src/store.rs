//! JSON snapshot persistence.
//!
//! The whole office state is written as one document; saves go through a
//! temporary file and a rename so a crash never leaves a half-written
//! snapshot behind.

use crate::model::{Consultation, Patient, Practitioner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILE: &str = "clinic.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialized form of the office: accounts, patients (with records),
/// every consultation in insertion order and the logins of removed accounts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub practitioners: Vec<Practitioner>,
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    #[serde(default)]
    pub retired_logins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; a missing file is an empty office.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot yet");
            return Ok(Snapshot::default());
        }
        let bytes = std::fs::read(&self.path).map_err(|source| self.io_error(source))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            patients = snapshot.patients.len(),
            consultations = snapshot.consultations.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        info!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
