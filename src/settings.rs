// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings layout.
//!
//! Specify the layout of the settings file that tells dbiwatch which project
//! to watch, how its language assets are named, and where files go. File I/O
//! is left to the caller to figure out.
//!
//! # General Layout
//!
//! Every key is optional. Missing keys take the defaults shown here:
//!
//! ```toml
//! repository = "rashevskyv/DBIPatcher"
//! api_base = "https://api.github.com"
//! project = "DBI"
//! asset_prefix = "DBI"
//! asset_extension = "nro"
//! download_url = "https://github.com/{repository}/releases/latest/download/{filename}"
//! output_dir = "output"
//! state_file = "state.json"
//! languages = "languages.json"
//! ```
//!
//! Path settings go through shell expansion, so `~/dbi/state.json` or
//! `$XDG_STATE_HOME/dbiwatch/state.json` work as expected.

use crate::{
    bundle::{AssetPattern, LinkTemplate},
    release::GITHUB_API,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Run settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Watched GitHub repository as `owner/name`.
    pub repository: String,

    /// Base URL of GitHub REST API.
    pub api_base: String,

    /// Project name used in archive names.
    pub project: String,

    /// First dotted part of language asset filenames.
    pub asset_prefix: String,

    /// Last dotted part of language asset filenames.
    pub asset_extension: String,

    /// Template of download reference written for each language.
    pub download_url: String,

    /// Directory receiving generated artifacts.
    pub output_dir: PathBuf,

    /// Path to state file.
    pub state_file: PathBuf,

    /// Path to language mapping file.
    pub languages: PathBuf,
}

impl Settings {
    /// Asset pattern described by settings.
    pub fn asset_pattern(&self) -> AssetPattern {
        AssetPattern::new(&self.asset_prefix, &self.asset_extension)
    }

    /// Link template described by settings.
    pub fn link_template(&self) -> LinkTemplate {
        LinkTemplate::new(&self.download_url, &self.repository)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository: "rashevskyv/DBIPatcher".into(),
            api_base: GITHUB_API.into(),
            project: "DBI".into(),
            asset_prefix: "DBI".into(),
            asset_extension: "nro".into(),
            download_url: LinkTemplate::LATEST.into(),
            output_dir: PathBuf::from("output"),
            state_file: PathBuf::from("state.json"),
            languages: PathBuf::from("languages.json"),
        }
    }
}

impl FromStr for Settings {
    type Err = SettingsError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(SettingsError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.output_dir = expand(&settings.output_dir)?;
        settings.state_file = expand(&settings.state_file)?;
        settings.languages = expand(&settings.languages)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(SettingsError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &std::path::Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Settings error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SettingsError {
    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<SettingsError> for FmtError {
    fn from(_: SettingsError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = SettingsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn deserialize_empty_settings() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());

        Ok(())
    }

    #[sealed_test(env = [("DBI_HOME", "/srv/dbi")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            repository = "someone/fork"
            project = "DBI-fork"
            output_dir = "$DBI_HOME/out"
            state_file = "${DBI_HOME}/state.json"
        "#
        .parse()?;

        let expect = Settings {
            repository: "someone/fork".into(),
            project: "DBI-fork".into(),
            output_dir: PathBuf::from("/srv/dbi/out"),
            state_file: PathBuf::from("/srv/dbi/state.json"),
            ..Settings::default()
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn deserialize_settings_with_unset_variable() {
        let result = r#"output_dir = "$DBIWATCH_UNSET_VARIABLE/out""#.parse::<Settings>();
        assert!(matches!(result, Err(SettingsError::ShellExpansion(_))));
    }

    #[test]
    fn deserialize_settings_rejects_wrong_types() {
        let result = "repository = 42".parse::<Settings>();
        assert!(matches!(result, Err(SettingsError::Deserialize(_))));
    }

    #[test]
    fn serialize_settings() {
        let result = Settings::default().to_string();
        let expect = indoc! {r#"
            repository = "rashevskyv/DBIPatcher"
            api_base = "https://api.github.com"
            project = "DBI"
            asset_prefix = "DBI"
            asset_extension = "nro"
            download_url = "https://github.com/{repository}/releases/latest/download/{filename}"
            output_dir = "output"
            state_file = "state.json"
            languages = "languages.json"
        "#};
        assert_eq!(result, expect);
    }
}
