// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where dbiwatch looks for files that the user did not point it
//! at explicitly.

use std::path::{Path, PathBuf};

/// Determine default absolute path to settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dbiwatch/settings.toml` as
/// the default location. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dbiwatch").join("settings.toml"))
        .ok_or(NoWayHome)
}

/// Turn a release tag into a single, path-safe directory name.
///
/// Every character outside `[A-Za-z0-9._-]` becomes an underscore, and names
/// made only of dots are prefixed so they never resolve to `.` or `..`.
pub fn tag_dir_name(tag: &str) -> String {
    if tag.is_empty() {
        return "untagged".into();
    }

    let name: String = tag
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();

    if name.chars().all(|c| c == '.') {
        return format!("_{name}");
    }

    name
}

/// Resolve directory that holds all artifacts of a given release tag.
pub fn release_dir(output_dir: &Path, tag: &str) -> PathBuf {
    output_dir.join(tag_dir_name(tag))
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("v8.10", "v8.10"; "plain tag")]
    #[test_case("release/8.10", "release_8.10"; "slash separated")]
    #[test_case("..", "_.."; "parent directory")]
    #[test_case("a\\b c", "a_b_c"; "backslash and space")]
    #[test_case("", "untagged"; "empty tag")]
    #[test]
    fn tag_dir_name_is_path_safe(tag: &str, expect: &str) {
        assert_eq!(tag_dir_name(tag), expect);
    }

    #[test]
    fn release_dir_joins_sanitized_tag() {
        let result = release_dir(Path::new("output"), "release/1");
        assert_eq!(result, PathBuf::from("output/release_1"));
    }
}
