// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Home-directory expansion for configured paths.

use std::path::PathBuf;

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading tilde, or with `~user` forms, are returned as-is.
pub fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_unchanged() {
        assert_eq!(expand_path("/usr/share/corral"), PathBuf::from("/usr/share/corral"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/.corral/packs"), home.join(".corral/packs"));
            assert_eq!(expand_path("~"), home);
        }
    }

    #[test]
    fn other_user_tilde_unchanged() {
        assert_eq!(expand_path("~bob/plugins"), PathBuf::from("~bob/plugins"));
    }
}
