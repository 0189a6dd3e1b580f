// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin reject lists.
//!
//! An optional TOML file names modules that must never load:
//!
//! ```toml
//! filter_version = "1.0"
//! module_rejectlist = ["shell", "raw"]
//! ```
//!
//! The list applies to both `modules` and `action` lookups. A broken or
//! unrecognized file is skipped with a warning; rejecting `stat` is an error.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use corral_core::{CorralError, PluginType};
use tracing::{debug, warn};

/// Filter file consulted when none is configured.
pub const DEFAULT_FILTER_FILE: &str = "/etc/corral/plugin_filters.toml";

const SUPPORTED_VERSION: &str = "1.0";
const ESSENTIAL_MODULE: &str = "stat";

/// Names rejected per plugin type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginFilters {
    rejected: HashMap<PluginType, BTreeSet<String>>,
}

impl PluginFilters {
    /// No filters at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Reject `names` for modules and actions.
    pub fn with_rejected_modules<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let mut rejected = HashMap::new();
        rejected.insert(PluginType::Modules, set.clone());
        rejected.insert(PluginType::Action, set);
        Self { rejected }
    }

    /// Load the configured filter file, or the system default when unset.
    pub fn load(configured: Option<&Path>) -> Result<Self, CorralError> {
        let user_set = configured.is_some();
        let path = configured.unwrap_or_else(|| Path::new(DEFAULT_FILTER_FILE));

        let filters = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => Self::parse(path, &content),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unable to read plugin filter file, skipping");
                    Self::none()
                }
            }
        } else {
            if user_set {
                warn!(path = %path.display(), "plugin filter file does not exist, skipping");
            }
            Self::none()
        };

        filters.check_essential(path)?;
        Ok(filters)
    }

    /// Parse filter text. Invalid content yields no filters and a warning.
    pub fn parse(path: &Path, content: &str) -> Self {
        let data: toml::Table = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "plugin filter file is not parsable, skipping");
                return Self::none();
            }
        };

        let Some(version) = data.get("filter_version") else {
            warn!(path = %path.display(), "plugin filter file has no filter_version, skipping");
            return Self::none();
        };
        // Accept 1.0 written as a number as well as a string.
        let version = match version {
            toml::Value::String(s) => s.trim().to_string(),
            toml::Value::Float(f) => format!("{f:?}"),
            toml::Value::Integer(i) => i.to_string(),
            other => other.to_string(),
        };
        if version != SUPPORTED_VERSION {
            warn!(
                path = %path.display(),
                version = %version,
                "plugin filter file version is not recognized, skipping"
            );
            return Self::none();
        }

        let names = match data.get("module_rejectlist") {
            Some(toml::Value::Array(items)) => items,
            None => return Self::none(),
            Some(_) => {
                warn!(path = %path.display(), "module_rejectlist is not a list, skipping");
                return Self::none();
            }
        };

        let mut rejected = Vec::new();
        for item in names {
            match item.as_str() {
                Some(name) => rejected.push(name.to_string()),
                None => debug!(path = %path.display(), entry = %item, "ignoring non-string reject entry"),
            }
        }
        Self::with_rejected_modules(rejected)
    }

    /// Whether `name` is rejected for `plugin_type`.
    pub fn is_rejected(&self, plugin_type: PluginType, name: &str) -> bool {
        self.rejected
            .get(&plugin_type)
            .is_some_and(|names| names.contains(name))
    }

    /// Rejected names for one type, sorted.
    pub fn rejected(&self, plugin_type: PluginType) -> Vec<&str> {
        self.rejected
            .get(&plugin_type)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn check_essential(&self, path: &Path) -> Result<(), CorralError> {
        if self.is_rejected(PluginType::Modules, ESSENTIAL_MODULE) {
            return Err(CorralError::Config(format!(
                "the {ESSENTIAL_MODULE} module was listed in the reject list file {}, \
                 but corral cannot function without it; remove it from the list",
                path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> PluginFilters {
        PluginFilters::parse(Path::new("filters.toml"), text)
    }

    #[test]
    fn rejects_modules_and_actions() {
        let filters = parse("filter_version = \"1.0\"\nmodule_rejectlist = [\"raw\", \"shell\"]\n");
        assert!(filters.is_rejected(PluginType::Modules, "raw"));
        assert!(filters.is_rejected(PluginType::Action, "shell"));
        assert!(!filters.is_rejected(PluginType::Lookup, "raw"));
        assert_eq!(filters.rejected(PluginType::Modules), vec!["raw", "shell"]);
    }

    #[test]
    fn numeric_version_is_accepted() {
        let filters = parse("filter_version = 1.0\nmodule_rejectlist = [\"raw\"]\n");
        assert!(filters.is_rejected(PluginType::Modules, "raw"));
    }

    #[test]
    fn bad_files_yield_no_filters() {
        assert_eq!(parse("not toml ["), PluginFilters::none());
        assert_eq!(parse("module_rejectlist = [\"raw\"]"), PluginFilters::none());
        assert_eq!(
            parse("filter_version = \"2.0\"\nmodule_rejectlist = [\"raw\"]"),
            PluginFilters::none()
        );
        assert_eq!(
            parse("filter_version = \"1.0\"\nmodule_rejectlist = \"raw\""),
            PluginFilters::none()
        );
    }

    #[test]
    fn missing_user_file_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let filters = PluginFilters::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(filters, PluginFilters::none());
    }

    #[test]
    fn rejecting_stat_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("filters.toml");
        std::fs::write(&path, "filter_version = \"1.0\"\nmodule_rejectlist = [\"stat\"]\n").unwrap();
        let err = PluginFilters::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CorralError::Config(_)));
        assert!(err.to_string().contains("stat"));
    }
}
