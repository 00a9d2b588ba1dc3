// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persistent record of the last processed release.
//!
//! Dbiwatch remembers which release it last turned into a bundle inside a
//! small JSON file called the __state file__:
//!
//! ```json
//! {
//!   "last_processed_release_id": 123456,
//!   "last_tag": "v8.10",
//!   "last_version": "810",
//!   "languages": ["en", "de"],
//!   "updated_at": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! Only `last_processed_release_id` decides whether a run has work to do. The
//! other fields are bookkeeping for humans, and may be absent.
//!
//! # Crash Safety
//!
//! The state file is never modified in place. A new record is written to a
//! temporary file that is then renamed over the old record. A crash at any
//! point leaves either the old record or the new record on disk. Overlapping
//! runs are not serialized, the last one to commit wins.

use crate::{fs::FileSystem, release::ReleaseId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Last processed release record.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct State {
    /// Identity of last fully processed release.
    pub last_processed_release_id: Option<ReleaseId>,

    /// Tag of last fully processed release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tag: Option<String>,

    /// Asset version of last fully processed release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,

    /// Locale codes bundled for last processed release, in output order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,

    /// When record was committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl State {
    /// Check if release was already processed.
    pub fn has_processed(&self, id: ReleaseId) -> bool {
        self.last_processed_release_id == Some(id)
    }
}

/// Load and commit [`State`] through a file system.
#[derive(Debug, Clone)]
pub struct StateStore<F>
where
    F: FileSystem,
{
    fs: F,
    path: PathBuf,
}

impl<F> StateStore<F>
where
    F: FileSystem,
{
    /// Construct new state store at target path.
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    /// Path to state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load current state.
    ///
    /// A missing state file simply means nothing was processed yet.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if state file exists but cannot be read.
    /// - Return [`StateError::Corrupt`] if state file exists but cannot be
    ///   parsed.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<State> {
        let bytes = self.fs.read(&self.path).map_err(|source| StateError::Read {
            source,
            path: self.path.clone(),
        })?;

        let Some(bytes) = bytes else {
            debug!("no state file at {}", self.path.display());
            return Ok(State::default());
        };

        let state: State = serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupt {
            source,
            path: self.path.clone(),
        })?;
        debug!("loaded state {state:?}");

        Ok(state)
    }

    /// Replace persisted state with new record.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Serialize`] if record cannot be serialized.
    /// - Return [`StateError::Write`] if record cannot be written. The
    ///   previous record stays intact.
    #[instrument(skip(self, state), level = "debug")]
    pub fn commit(&self, state: &State) -> Result<()> {
        let mut payload = serde_json::to_vec_pretty(state).map_err(StateError::Serialize)?;
        payload.push(b'\n');

        self.fs
            .write_atomic(&self.path, &payload)
            .map_err(|source| StateError::Write {
                source,
                path: self.path.clone(),
            })?;

        if let Some(id) = state.last_processed_release_id {
            info!("recorded release {id} as processed in {}", self.path.display());
        }

        Ok(())
    }
}

/// State persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// State file exists but cannot be read.
    #[error("failed to read state file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file exists but its contents are unusable.
    #[error("state file {:?} is corrupt, fix or remove it to continue", path.display())]
    Corrupt {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// State record cannot be serialized.
    #[error("failed to serialize state")]
    Serialize(#[source] serde_json::Error),

    /// State file cannot be replaced.
    #[error("failed to write state file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = StateError> = std::result::Result<T, E>;
