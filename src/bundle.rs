// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration bundle built from a release.
//!
//! A __bundle__ is what dbiwatch produces for every new release. It is made
//! of three artifacts:
//!
//! 1. `config.ini`, an Ultrahand package script with one section per
//!    language that downloads the matching DBI build.
//! 2. `metadata.json`, a record of which release the script was built from.
//! 3. `<project>_<version>_<tag>.zip`, an archive of the two files above.
//!
//! Building happens in two steps. The [`layout`] step picks the language
//! assets out of a release and orders them into a [`Config`]. The [`package`]
//! step renders that config and packs everything into an [`ArtifactSet`].
//! Both steps are pure: identical input always gives identical output, down
//! to the bytes of the zip archive.

pub mod layout;
pub mod package;

pub use layout::{AssetName, AssetPattern, ConfigBuilder, LinkTemplate};
pub use package::{ArchiveBuilder, PackagingError};

/// Single language section of generated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    /// Display name used as section header.
    pub language: String,

    /// Locale code extracted from asset filename.
    pub code: String,

    /// Version token extracted from asset filename.
    pub version: String,

    /// Download reference of asset.
    pub source: String,
}

/// Ordered language sections of generated configuration.
///
/// # Invariant
///
/// - Blocks are sorted by language name, ignoring case, with ties kept in
///   upstream asset order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Version of first matching asset.
    pub version: Option<String>,

    /// Language sections in output order.
    pub blocks: Vec<ConfigBlock>,
}

impl Config {
    /// Locale codes in output order.
    pub fn codes(&self) -> Vec<String> {
        self.blocks.iter().map(|block| block.code.clone()).collect()
    }

    /// Check if config has no language sections.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Rendered artifacts of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Contents of `config.ini`.
    pub config_ini: String,

    /// Contents of `metadata.json`.
    pub metadata_json: String,

    /// File name of zip archive.
    pub archive_name: String,

    /// Contents of zip archive.
    pub zip_bytes: Vec<u8>,
}
