// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dbiwatch::{
    path::default_settings_path,
    watch::{Outcome, RunOptions, Watcher},
    GithubReleases, LanguageMapping, LocalFs, Settings,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Watch DBIPatcher releases and build Ultrahand config.ini archive.
#[derive(Debug, Clone, Parser)]
#[command(about, override_usage = "dbiwatch [options]", version)]
struct Cli {
    /// Force regeneration even if release was already processed.
    #[arg(short, long)]
    pub force: bool,

    /// Directory to store generated artifacts.
    #[arg(short, long, value_name = "path")]
    pub output_dir: Option<PathBuf>,

    /// Path to store release tracking state.
    #[arg(short, long, value_name = "path")]
    pub state_file: Option<PathBuf>,

    /// JSON file with language mapping.
    #[arg(short, long, value_name = "path")]
    pub languages: Option<PathBuf>,

    /// Settings file to read instead of the default one.
    #[arg(long, value_name = "path")]
    pub settings: Option<PathBuf>,

    /// Watched GitHub repository as owner/name.
    #[arg(short, long, value_name = "owner/name")]
    pub repository: Option<String>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let mut settings = load_settings(self.settings.clone())?;
        if let Some(output_dir) = self.output_dir {
            settings.output_dir = output_dir;
        }
        if let Some(state_file) = self.state_file {
            settings.state_file = state_file;
        }
        if let Some(languages) = self.languages {
            settings.languages = languages;
        }
        if let Some(repository) = self.repository {
            settings.repository = repository;
        }
        debug!("effective settings:\n{settings}");

        let fs = LocalFs::new();
        let mapping = LanguageMapping::load(&fs, &settings.languages)?;
        let source = GithubReleases::new(&settings.repository, &settings.api_base)?;
        let watcher = Watcher::new(source, fs, &settings.state_file, &settings.output_dir)
            .asset_pattern(settings.asset_pattern())
            .link_template(settings.link_template())
            .project(&settings.project);
        debug!("tracking state in {}", watcher.state_file().display());

        match watcher.run(&mapping, RunOptions { force: self.force }).await? {
            Outcome::Skipped { tag, .. } => {
                info!("latest release {tag} was already processed, use --force to rebuild");
            }
            Outcome::Built(report) => {
                info!(
                    "prepared package for release {} with version {}",
                    report.tag,
                    report.version.as_deref().unwrap_or("<none>")
                );
                info!("languages: {}", report.languages.join(", "));
                for path in report.written {
                    info!("artifact: {}", path.display());
                }
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(explicit: Option<PathBuf>) -> Result<Settings> {
    let (path, required) = match explicit {
        Some(path) => (path, true),
        None => match default_settings_path() {
            Ok(path) => (path, false),
            Err(_) => return Ok(Settings::default()),
        },
    };

    if !required && !path.exists() {
        debug!("no settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    data.parse::<Settings>()
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}
