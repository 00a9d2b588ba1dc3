// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Language section layout.
//!
//! Turns the asset listing of a release into an ordered [`Config`].
//!
//! # Asset Names
//!
//! Upstream publishes one build per language, named after the pattern
//! `<prefix>.<version>.<code>.<extension>`, e.g., `DBI.810.en.nro`. A file
//! is a language asset if and only if:
//!
//! - Its lowercased name starts with `<prefix>.` and ends with `.<extension>`.
//! - Splitting its name on `.` yields exactly four non-empty parts.
//!
//! Everything else attached to a release (checksums, readmes, the English
//! fallback without a locale code, ...) is left out of the config. The locale
//! code and version are taken verbatim from the third and second parts.
//!
//! # Ordering
//!
//! Sections are ordered by display name ignoring case, so `english` sorts
//! before `German`. Sorting is stable, thus two assets that end up with the
//! same display name keep the order upstream listed them in.

use crate::{
    bundle::{Config, ConfigBlock},
    language::LanguageMapping,
    release::Asset,
};

use tracing::debug;

/// Filename pattern of language assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPattern {
    prefix: String,
    extension: String,
}

impl AssetPattern {
    /// Construct new asset pattern.
    ///
    /// Prefix and extension are matched ignoring case.
    pub fn new(prefix: impl AsRef<str>, extension: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('.').to_lowercase(),
            extension: extension.as_ref().trim_matches('.').to_lowercase(),
        }
    }

    /// Match filename against pattern.
    ///
    /// Returns `None` if file is not a language asset.
    pub fn parse<'a>(&self, filename: &'a str) -> Option<AssetName<'a>> {
        let lower = filename.to_lowercase();
        if !lower.starts_with(&format!("{}.", self.prefix))
            || !lower.ends_with(&format!(".{}", self.extension))
        {
            return None;
        }

        let parts: Vec<&str> = filename.split('.').collect();
        match parts[..] {
            [_, version, code, _] if !version.is_empty() && !code.is_empty() => {
                Some(AssetName { version, code })
            }
            _ => None,
        }
    }
}

impl Default for AssetPattern {
    fn default() -> Self {
        Self::new("DBI", "nro")
    }
}

/// Pieces extracted from a language asset filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetName<'a> {
    /// Build version.
    pub version: &'a str,

    /// Locale code.
    pub code: &'a str,
}

/// Template of download reference written into each language section.
///
/// Recognizes the placeholders `{repository}`, `{filename}`, `{version}`,
/// `{code}`, and `{url}`. The last one is the asset's own download reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    template: String,
    repository: String,
}

impl LinkTemplate {
    /// Link to the newest release, which keeps scripts valid across releases.
    pub const LATEST: &'static str =
        "https://github.com/{repository}/releases/latest/download/{filename}";

    /// Construct new link template for `owner/name` repository.
    pub fn new(template: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            repository: repository.into(),
        }
    }

    /// Render download reference of language asset.
    pub fn render(&self, asset: &Asset, name: &AssetName<'_>) -> String {
        self.template
            .replace("{repository}", &self.repository)
            .replace("{filename}", &asset.filename)
            .replace("{version}", name.version)
            .replace("{code}", name.code)
            .replace("{url}", &asset.download_url)
    }
}

/// Build ordered language sections from release assets.
#[derive(Debug, Clone)]
pub struct ConfigBuilder<'a> {
    pattern: &'a AssetPattern,
    links: &'a LinkTemplate,
}

impl<'a> ConfigBuilder<'a> {
    /// Construct new config builder.
    pub fn new(pattern: &'a AssetPattern, links: &'a LinkTemplate) -> Self {
        Self { pattern, links }
    }

    /// Build config from asset listing.
    ///
    /// Never fails. Non-language assets are skipped, and locale codes missing
    /// from the mapping are used as their own display name. The config version
    /// is the version of the first language asset. Packaging rejects configs
    /// whose sections disagree with it.
    pub fn build(&self, assets: &[Asset], mapping: &LanguageMapping) -> Config {
        let mut version: Option<String> = None;
        let mut blocks = Vec::new();

        for asset in assets {
            let Some(name) = self.pattern.parse(&asset.filename) else {
                debug!("skip non-language asset {}", asset.filename);
                continue;
            };

            if version.is_none() {
                version = Some(name.version.to_string());
            }

            blocks.push(ConfigBlock {
                language: mapping.display_name(name.code).to_string(),
                code: name.code.to_string(),
                version: name.version.to_string(),
                source: self.links.render(asset, &name),
            });
        }

        // INVARIANT: Stable sort keeps upstream order for equal names.
        blocks.sort_by_cached_key(|block| block.language.to_lowercase());

        Config { version, blocks }
    }
}
