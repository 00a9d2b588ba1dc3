// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Watch DBIPatcher releases and build Ultrahand language bundles.
//!
//! Dbiwatch checks the newest release of one upstream project. If that
//! release was not processed before, it picks the per-language builds out of
//! the release, writes an Ultrahand `config.ini` that offers each of them, a
//! `metadata.json`, and a zip archive of both, then records the release as
//! processed. Running it again does nothing until upstream publishes a new
//! release, or until a rebuild is forced.
//!
//! # See Also
//!
//! 1. [`watch`] for the phases of a run.
//! 2. [`bundle`] for the generated artifacts.
//! 3. [`state`] for the state file.

pub mod bundle;
pub mod fs;
pub mod language;
pub mod path;
pub mod release;
pub mod settings;
pub mod state;
pub mod watch;

pub use bundle::{ArchiveBuilder, ArtifactSet, Config, ConfigBlock, ConfigBuilder};
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use language::LanguageMapping;
pub use release::{Asset, GithubReleases, Release, ReleaseId, ReleaseSource};
pub use settings::Settings;
pub use state::{State, StateStore};
pub use watch::{Outcome, RunOptions, Watcher};
