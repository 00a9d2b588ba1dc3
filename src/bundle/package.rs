// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Artifact rendering and packaging.
//!
//! # Configuration Layout
//!
//! The generated `config.ini` follows the Ultrahand package script format.
//! Every language becomes one section that downloads the matching build and
//! moves it over the installed one:
//!
//! ```ini
//! ;LANGUAGES
//!
//! [English]
//! catch_errors
//! download https://github.com/.../DBI.810.en.nro /switch/DBI/DBI_new.nro
//! mv /switch/DBI/DBI_new.nro /switch/DBI/DBI.nro
//! ```
//!
//! # Reproducible Archives
//!
//! Zip entries carry a modification time and permissions of their own. Both
//! are pinned, the entry order is fixed, and compression settings never
//! change, so the same release and config always give the same archive bytes.

use crate::{
    bundle::{ArtifactSet, Config},
    path::tag_dir_name,
    release::{Release, ReleaseId},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::{Cursor, Write};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// File name of rendered configuration.
pub const CONFIG_FILE: &str = "config.ini";

/// File name of rendered metadata.
pub const METADATA_FILE: &str = "metadata.json";

const HEADER: &str = ";LANGUAGES";
const STAGING_PATH: &str = "/switch/DBI/DBI_new.nro";
const INSTALL_PATH: &str = "/switch/DBI/DBI.nro";

/// Render and pack artifacts of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveBuilder {
    project: String,
}

impl ArchiveBuilder {
    /// Construct new archive builder for project name used in archive names.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    /// Render config and metadata, then pack both into a zip archive.
    ///
    /// # Errors
    ///
    /// - Return [`PackagingError::InconsistentVersion`] if language assets
    ///   disagree on their version.
    /// - Return [`PackagingError::InvalidLanguage`] if a language name cannot
    ///   be written as a section header.
    /// - Return [`PackagingError::InvalidSource`] if a download reference
    ///   spans multiple lines.
    /// - Return [`PackagingError::Metadata`] if metadata cannot be serialized.
    /// - Return [`PackagingError::Zip`] if archive cannot be written.
    pub fn package(
        &self,
        release: &Release,
        config: &Config,
        built_at: DateTime<Utc>,
    ) -> Result<ArtifactSet> {
        check_versions(config)?;
        let config_ini = render_config(config)?;
        let metadata_json = render_metadata(release, config, built_at)?;
        let archive_name = self.archive_name(release, config);
        let zip_bytes = pack([
            (CONFIG_FILE, config_ini.as_bytes()),
            (METADATA_FILE, metadata_json.as_bytes()),
        ])?;

        Ok(ArtifactSet {
            config_ini,
            metadata_json,
            archive_name,
            zip_bytes,
        })
    }

    /// File name of archive, `<project>_<version>_<tag>.zip`.
    ///
    /// Falls back to the tag when no asset carried a version.
    pub fn archive_name(&self, release: &Release, config: &Config) -> String {
        let version = config.version.as_deref().unwrap_or(&release.tag);
        format!(
            "{}_{}_{}.zip",
            tag_dir_name(&self.project),
            tag_dir_name(version),
            tag_dir_name(&release.tag)
        )
    }
}

// INVARIANT: A bundle never mixes builds of different versions.
fn check_versions(config: &Config) -> Result<()> {
    let Some(expected) = config.version.as_deref() else {
        return Ok(());
    };

    match config.blocks.iter().find(|block| block.version != expected) {
        Some(block) => Err(PackagingError::InconsistentVersion {
            expected: expected.to_string(),
            found: block.version.clone(),
            code: block.code.clone(),
        }),
        None => Ok(()),
    }
}

/// Render config into Ultrahand package script.
///
/// # Errors
///
/// - Return [`PackagingError::InvalidLanguage`] if a language name is empty,
///   or holds brackets or line breaks.
/// - Return [`PackagingError::InvalidSource`] if a download reference holds
///   line breaks.
pub fn render_config(config: &Config) -> Result<String> {
    let mut sections = vec![HEADER.to_string()];
    for block in &config.blocks {
        if block.language.trim().is_empty()
            || block.language.contains(['[', ']', '\r', '\n'])
        {
            return Err(PackagingError::InvalidLanguage {
                language: block.language.clone(),
                code: block.code.clone(),
            });
        }

        if block.source.contains(['\r', '\n']) {
            return Err(PackagingError::InvalidSource {
                code: block.code.clone(),
            });
        }

        sections.push(format!(
            "[{}]\ncatch_errors\ndownload {} {STAGING_PATH}\nmv {STAGING_PATH} {INSTALL_PATH}",
            block.language, block.source
        ));
    }

    let mut content = sections.join("\n\n");
    content.push('\n');

    Ok(content)
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    id: ReleaseId,
    tag: &'a str,
    version: Option<&'a str>,
    languages: Vec<&'a str>,
    built_at: String,
}

/// Render metadata document of release.
///
/// # Errors
///
/// - Return [`PackagingError::Metadata`] if metadata cannot be serialized.
pub fn render_metadata(
    release: &Release,
    config: &Config,
    built_at: DateTime<Utc>,
) -> Result<String> {
    let metadata = Metadata {
        id: release.id,
        tag: &release.tag,
        version: config.version.as_deref(),
        languages: config.blocks.iter().map(|block| block.code.as_str()).collect(),
        built_at: built_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let mut content = serde_json::to_string_pretty(&metadata).map_err(PackagingError::Metadata)?;
    content.push('\n');

    Ok(content)
}

fn pack<'a>(entries: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Result<Vec<u8>> {
    // INVARIANT: Pin every entry attribute that would otherwise vary per build.
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(name, options)?;
        writer.write_all(contents).map_err(zip::result::ZipError::Io)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Packaging error types.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    /// Language assets were built from different versions.
    #[error("locale code {code:?} has version {found:?}, expected {expected:?}")]
    InconsistentVersion {
        expected: String,
        found: String,
        code: String,
    },

    /// Language name cannot be used as a section header.
    #[error("language name {language:?} of locale code {code:?} cannot be used as section header")]
    InvalidLanguage { language: String, code: String },

    /// Download reference cannot be written on a single line.
    #[error("download reference of locale code {code:?} spans multiple lines")]
    InvalidSource { code: String },

    /// Metadata cannot be serialized.
    #[error("failed to serialize metadata")]
    Metadata(#[source] serde_json::Error),

    /// Archive cannot be written.
    #[error("failed to write zip archive")]
    Zip(#[from] zip::result::ZipError),
}

/// Friendly result alias :3
type Result<T, E = PackagingError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bundle::ConfigBlock, release::Asset};
    use chrono::TimeZone;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use zip::ZipArchive;

    fn block(language: &str, code: &str) -> ConfigBlock {
        ConfigBlock {
            language: language.into(),
            code: code.into(),
            version: "810".into(),
            source: format!("https://example.org/DBI.810.{code}.nro"),
        }
    }

    fn release() -> Release {
        Release {
            id: ReleaseId(99),
            tag: "v8.10".into(),
            assets: vec![Asset::new("DBI.810.en.nro", "https://example.org/DBI.810.en.nro")],
        }
    }

    fn config() -> Config {
        Config {
            version: Some("810".into()),
            blocks: vec![block("English", "en"), block("Русский", "ru")],
        }
    }

    fn built_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn render_config_sections() -> anyhow::Result<()> {
        let result = render_config(&config())?;
        let expect = indoc! {"
            ;LANGUAGES

            [English]
            catch_errors
            download https://example.org/DBI.810.en.nro /switch/DBI/DBI_new.nro
            mv /switch/DBI/DBI_new.nro /switch/DBI/DBI.nro

            [Русский]
            catch_errors
            download https://example.org/DBI.810.ru.nro /switch/DBI/DBI_new.nro
            mv /switch/DBI/DBI_new.nro /switch/DBI/DBI.nro
        "};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn render_empty_config() -> anyhow::Result<()> {
        assert_eq!(render_config(&Config::default())?, ";LANGUAGES\n");

        Ok(())
    }

    #[test]
    fn render_metadata_document() -> anyhow::Result<()> {
        let result = render_metadata(&release(), &config(), built_at())?;
        let expect = indoc! {r#"
            {
              "id": 99,
              "tag": "v8.10",
              "version": "810",
              "languages": [
                "en",
                "ru"
              ],
              "built_at": "2025-06-01T12:30:00Z"
            }
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn package_rejects_unrenderable_language() {
        for language in ["", "  ", "Eng]lish", "[English", "Eng\nlish"] {
            let config = Config {
                version: Some("810".into()),
                blocks: vec![block(language, "en")],
            };
            let result = ArchiveBuilder::new("DBI").package(&release(), &config, built_at());
            assert!(
                matches!(result, Err(PackagingError::InvalidLanguage { .. })),
                "accepted {language:?}"
            );
        }
    }

    #[test]
    fn package_rejects_multiline_source() {
        let mut bad = block("English", "en");
        bad.source.push_str("\nrm -rf /switch");
        let config = Config {
            version: Some("810".into()),
            blocks: vec![bad],
        };

        let result = ArchiveBuilder::new("DBI").package(&release(), &config, built_at());
        assert!(matches!(result, Err(PackagingError::InvalidSource { .. })));
    }

    #[test]
    fn package_rejects_mixed_versions() {
        let mut newer = block("Русский", "ru");
        newer.version = "811".into();
        let config = Config {
            version: Some("810".into()),
            blocks: vec![block("English", "en"), newer],
        };

        let result = ArchiveBuilder::new("DBI").package(&release(), &config, built_at());
        assert!(matches!(
            result,
            Err(PackagingError::InconsistentVersion { ref expected, ref found, ref code })
                if expected == "810" && found == "811" && code == "ru"
        ));
    }

    #[test]
    fn package_is_reproducible() -> anyhow::Result<()> {
        let builder = ArchiveBuilder::new("DBI");
        let first = builder.package(&release(), &config(), built_at())?;
        let second = builder.package(&release(), &config(), built_at())?;
        assert_eq!(first, second);
        assert_eq!(first.archive_name, "DBI_810_v8.10.zip");

        Ok(())
    }

    #[test]
    fn package_archive_contents() -> anyhow::Result<()> {
        let artifacts = ArchiveBuilder::new("DBI").package(&release(), &config(), built_at())?;
        let mut archive = ZipArchive::new(Cursor::new(artifacts.zip_bytes.clone()))?;

        let names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        assert_eq!(names.len(), 2);

        let mut expected = [
            (CONFIG_FILE, artifacts.config_ini.as_str()),
            (METADATA_FILE, artifacts.metadata_json.as_str()),
        ]
        .into_iter();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let (name, contents) = expected.next().unwrap();
            assert_eq!(entry.name(), name);
            let modified = entry.last_modified();
            assert_eq!(
                (modified.year(), modified.month(), modified.day(), modified.hour()),
                (1980, 1, 1, 0)
            );

            let mut data = String::new();
            entry.read_to_string(&mut data)?;
            assert_eq!(data, contents);
        }

        Ok(())
    }

    #[test]
    fn archive_name_falls_back_to_tag() {
        let result = ArchiveBuilder::new("DBI").archive_name(&release(), &Config::default());
        assert_eq!(result, "DBI_v8.10_v8.10.zip");
    }
}
