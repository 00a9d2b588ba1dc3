// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Locale code to display name mapping.
//!
//! The mapping file is a flat JSON object whose keys are short locale codes
//! found in asset filenames, and whose values are the display names used as
//! section headers in the generated configuration:
//!
//! ```json
//! { "en": "English", "de": "German", "cs": "Čeština" }
//! ```
//!
//! The mapping is loaded once at the start of a run, and handed to whoever
//! needs it. It is never changed afterwards.

use crate::fs::FileSystem;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Read-only mapping of locale codes to display names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LanguageMapping {
    names: BTreeMap<String, String>,
}

impl LanguageMapping {
    /// Load mapping from JSON file.
    ///
    /// # Errors
    ///
    /// - Return [`LanguageError::Missing`] if file does not exist.
    /// - Return [`LanguageError::Read`] if file cannot be read.
    /// - Return [`LanguageError::Parse`] if file is not a JSON object of
    ///   strings.
    pub fn load(fs: &impl FileSystem, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs
            .read(path)
            .map_err(|source| LanguageError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .ok_or_else(|| LanguageError::Missing {
                path: path.to_path_buf(),
            })?;

        let mapping = Self {
            names: serde_json::from_slice(&bytes).map_err(|source| LanguageError::Parse {
                source,
                path: path.to_path_buf(),
            })?,
        };

        if mapping.is_empty() {
            warn!(
                "language mapping {} is empty, raw locale codes will be used",
                path.display()
            );
        }
        debug!(
            "loaded {} language names from {}",
            mapping.names.len(),
            path.display()
        );

        Ok(mapping)
    }

    /// Look up display name of locale code.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    /// Display name of locale code, or the code itself when unmapped.
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).unwrap_or_else(|| {
            warn!("no display name for locale code {code:?}");
            code
        })
    }

    /// Check if mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LanguageMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        }
    }
}

/// Language mapping error types.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    /// Mapping file does not exist.
    #[error("language mapping file {:?} does not exist", path.display())]
    Missing { path: PathBuf },

    /// Mapping file cannot be read.
    #[error("failed to read language mapping file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Mapping file is not a JSON object of strings.
    #[error("failed to parse language mapping file {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = LanguageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_language_mapping() -> anyhow::Result<()> {
        let fs = MemoryFs::new();
        fs.insert(
            "languages.json",
            r#"{ "en": "English", "de": "German", "cs": "Čeština" }"#,
        );

        let result = LanguageMapping::load(&fs, "languages.json")?;
        let expect = LanguageMapping::from_iter([
            ("cs", "Čeština"),
            ("de", "German"),
            ("en", "English"),
        ]);
        assert_eq!(result, expect);
        assert_eq!(result.display_name("cs"), "Čeština");
        assert_eq!(result.display_name("xx"), "xx");

        Ok(())
    }

    #[test]
    fn load_missing_language_mapping() {
        let fs = MemoryFs::new();
        let result = LanguageMapping::load(&fs, "languages.json");
        assert!(matches!(result, Err(LanguageError::Missing { .. })));
    }

    #[test]
    fn load_malformed_language_mapping() {
        let fs = MemoryFs::new();
        fs.insert("array.json", r#"["en", "de"]"#);
        fs.insert("numbers.json", r#"{ "en": 1 }"#);

        for path in ["array.json", "numbers.json"] {
            let result = LanguageMapping::load(&fs, path);
            assert!(matches!(result, Err(LanguageError::Parse { .. })));
        }
    }

    #[test]
    fn load_empty_language_mapping() -> anyhow::Result<()> {
        let fs = MemoryFs::new();
        fs.insert("languages.json", "{}");

        let result = LanguageMapping::load(&fs, "languages.json")?;
        assert!(result.is_empty());

        Ok(())
    }
}
