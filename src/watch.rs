// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release watching.
//!
//! The [`Watcher`] ties everything together. Each run walks through the
//! following phases exactly once, stopping at the first terminal one:
//!
//! ```text
//! START -> FETCHED -> SKIPPED
//!                  -> BUILT -> PACKAGED -> COMMITTED
//! ```
//!
//! 1. __Fetch__ the newest release. Failing to do so ends the run.
//! 2. __Compare__ its id against the state file. If it was already processed
//!    and the run is not forced, the run is __skipped__: nothing is written.
//! 3. __Build__ the language sections, and __package__ them into artifacts.
//! 4. __Write__ the artifacts into the release directory of the output
//!    directory.
//! 5. __Commit__ the release id to the state file.
//!
//! State is only ever touched in the last phase. A run that fails anywhere
//! before it can simply be repeated, and artifacts left behind by a run that
//! failed between writing and committing are overwritten by the next one.

use crate::{
    bundle::{
        package::{CONFIG_FILE, METADATA_FILE},
        ArchiveBuilder, AssetPattern, ConfigBuilder, LinkTemplate, PackagingError,
    },
    fs::FileSystem,
    language::LanguageMapping,
    path::release_dir,
    release::{FetchError, ReleaseId, ReleaseSource},
    state::{State, StateError, StateStore},
};

use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Source of build timestamps.
pub trait Clock {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed point in time always reports itself.
impl Clock for DateTime<Utc> {
    fn now(&self) -> DateTime<Utc> {
        *self
    }
}

/// Options of a single run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Rebuild even if newest release was already processed.
    pub force: bool,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Newest release was already processed, nothing was done.
    Skipped { id: ReleaseId, tag: String },

    /// Newest release was turned into artifacts and recorded.
    Built(Report),
}

/// Summary of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Identity of processed release.
    pub id: ReleaseId,

    /// Tag of processed release.
    pub tag: String,

    /// Version of language assets, if any were found.
    pub version: Option<String>,

    /// Locale codes in output order.
    pub languages: Vec<String>,

    /// Every artifact written, in write order.
    pub written: Vec<PathBuf>,
}

/// Watch one upstream project and build artifacts for new releases.
#[derive(Debug)]
pub struct Watcher<S, F, C = SystemClock>
where
    S: ReleaseSource,
    F: FileSystem,
    C: Clock,
{
    source: S,
    fs: F,
    clock: C,
    store: StateStore<F>,
    output_dir: PathBuf,
    pattern: AssetPattern,
    links: LinkTemplate,
    archiver: ArchiveBuilder,
}

impl<S, F> Watcher<S, F, SystemClock>
where
    S: ReleaseSource,
    F: FileSystem + Clone,
{
    /// Construct new watcher that stamps builds with system time.
    pub fn new(
        source: S,
        fs: F,
        state_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_clock(source, fs, SystemClock, state_file, output_dir)
    }
}

impl<S, F, C> Watcher<S, F, C>
where
    S: ReleaseSource,
    F: FileSystem + Clone,
    C: Clock,
{
    /// Construct new watcher with custom clock.
    pub fn with_clock(
        source: S,
        fs: F,
        clock: C,
        state_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let store = StateStore::new(fs.clone(), state_file);
        Self {
            source,
            fs,
            clock,
            store,
            output_dir: output_dir.into(),
            pattern: AssetPattern::default(),
            links: LinkTemplate::new(LinkTemplate::LATEST, "rashevskyv/DBIPatcher"),
            archiver: ArchiveBuilder::new("DBI"),
        }
    }

    /// Use custom language asset pattern.
    pub fn asset_pattern(mut self, pattern: AssetPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Use custom download link template.
    pub fn link_template(mut self, links: LinkTemplate) -> Self {
        self.links = links;
        self
    }

    /// Use custom project name in archive names.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.archiver = ArchiveBuilder::new(project);
        self
    }
}

impl<S, F, C> Watcher<S, F, C>
where
    S: ReleaseSource,
    F: FileSystem,
    C: Clock,
{
    /// Process newest release unless it was already processed.
    ///
    /// # Errors
    ///
    /// - Return [`WatchError::Fetch`] if newest release cannot be fetched.
    /// - Return [`WatchError::State`] if state file is unreadable or corrupt,
    ///   or cannot be committed.
    /// - Return [`WatchError::Packaging`] if artifacts cannot be rendered.
    /// - Return [`WatchError::WriteArtifact`] if artifacts cannot be written.
    #[instrument(skip(self, mapping), level = "debug")]
    pub async fn run(&self, mapping: &LanguageMapping, opts: RunOptions) -> Result<Outcome> {
        let release = self.source.latest_release().await?;
        info!(
            "fetched release {} ({}) with {} assets",
            release.tag,
            release.id,
            release.assets.len()
        );

        let state = self.store.load()?;
        if state.has_processed(release.id) {
            if !opts.force {
                info!("release {} was already processed, use --force to rebuild", release.tag);
                return Ok(Outcome::Skipped {
                    id: release.id,
                    tag: release.tag,
                });
            }

            info!("release {} was already processed, rebuilding anyway", release.tag);
        }

        let config = ConfigBuilder::new(&self.pattern, &self.links).build(&release.assets, mapping);
        info!(
            "built config with {} languages from release {}",
            config.blocks.len(),
            release.tag
        );

        // INVARIANT: Timestamp is taken once, so metadata and state agree.
        let built_at = self.clock.now().trunc_subsecs(0);
        let artifacts = self.archiver.package(&release, &config, built_at)?;
        info!("packaged {}", artifacts.archive_name);

        let dir = release_dir(&self.output_dir, &release.tag);
        let written = [
            (dir.join(CONFIG_FILE), artifacts.config_ini.as_bytes()),
            (dir.join(METADATA_FILE), artifacts.metadata_json.as_bytes()),
            (dir.join(&artifacts.archive_name), artifacts.zip_bytes.as_slice()),
        ]
        .into_iter()
        .map(|(path, contents)| self.write_artifact(path, contents))
        .collect::<Result<Vec<_>>>()?;

        let languages = config.codes();
        self.store.commit(&State {
            last_processed_release_id: Some(release.id),
            last_tag: Some(release.tag.clone()),
            last_version: config.version.clone(),
            languages: languages.clone(),
            updated_at: Some(built_at),
        })?;

        Ok(Outcome::Built(Report {
            id: release.id,
            tag: release.tag,
            version: config.version,
            languages,
            written,
        }))
    }

    /// Path to state file.
    pub fn state_file(&self) -> &Path {
        self.store.path()
    }

    fn write_artifact(&self, path: PathBuf, contents: &[u8]) -> Result<PathBuf> {
        self.fs
            .write_atomic(&path, contents)
            .map_err(|source| WatchError::WriteArtifact {
                source,
                path: path.clone(),
            })?;
        info!("wrote {}", path.display());

        Ok(path)
    }
}

/// Release watching error types.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Newest release cannot be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// State file cannot be loaded or committed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Artifacts cannot be rendered.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// Artifact cannot be written to output directory.
    #[error("failed to write artifact {:?}", path.display())]
    WriteArtifact {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = WatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::MemoryFs,
        release::{Asset, Release},
    };
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRelease {
        release: Release,
        calls: AtomicUsize,
    }

    impl FixedRelease {
        fn new(release: Release) -> Self {
            Self {
                release,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ReleaseSource for FixedRelease {
        async fn latest_release(&self) -> crate::release::Result<Release> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.release.clone())
        }
    }

    fn release() -> Release {
        Release {
            id: ReleaseId(7),
            tag: "v8.10".into(),
            assets: vec![
                Asset::new("DBI.810.ru.nro", "https://example.org/DBI.810.ru.nro"),
                Asset::new("DBI.810.en.nro", "https://example.org/DBI.810.en.nro"),
            ],
        }
    }

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[tokio::test]
    async fn run_records_built_release() -> anyhow::Result<()> {
        let fs = MemoryFs::new();
        let source = FixedRelease::new(release());
        let watcher = Watcher::with_clock(&source, &fs, clock(), "state.json", "out");
        let mapping = LanguageMapping::from_iter([("en", "English"), ("ru", "Русский")]);

        let outcome = watcher.run(&mapping, RunOptions::default()).await?;
        let expect = Outcome::Built(Report {
            id: ReleaseId(7),
            tag: "v8.10".into(),
            version: Some("810".into()),
            languages: vec!["en".into(), "ru".into()],
            written: vec![
                PathBuf::from("out/v8.10/config.ini"),
                PathBuf::from("out/v8.10/metadata.json"),
                PathBuf::from("out/v8.10/DBI_810_v8.10.zip"),
            ],
        });
        assert_eq!(outcome, expect);

        let state = StateStore::new(&fs, "state.json").load()?;
        assert_eq!(state.last_processed_release_id, Some(ReleaseId(7)));
        assert_eq!(state.updated_at, Some(clock()));
        assert_eq!(fs.writes().last(), Some(&PathBuf::from("state.json")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        Ok(())
    }
}
