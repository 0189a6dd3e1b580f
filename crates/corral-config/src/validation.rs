// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths and well-formed extension filters.

use std::collections::HashSet;

use corral_core::PluginType;
use strum::IntoEnumIterator;

use crate::diagnostic::ConfigError;
use crate::model::CorralConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or every collected error
/// (does not fail fast).
pub fn validate_config(config: &CorralConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.loader.builtin_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "loader.builtin_dir must not be empty".to_string(),
        });
    }

    if let Some(runtime) = &config.loader.builtin_runtime
        && runtime.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "loader.builtin_runtime must not be empty when set".to_string(),
        });
    }

    check_paths(&mut errors, "loader.plugin_roots", &config.loader.plugin_roots);
    check_paths(&mut errors, "packs.paths", &config.packs.paths);
    for plugin_type in PluginType::iter() {
        let key = format!("plugin_paths.{plugin_type}");
        check_paths(&mut errors, &key, config.plugin_paths.for_type(plugin_type));
    }

    for ext in &config.loader.ignore_extensions {
        if ext.is_empty() || !(ext.starts_with('.') || ext == "~") {
            errors.push(ConfigError::Validation {
                message: format!(
                    "loader.ignore_extensions entry `{ext}` must start with `.` or be `~`"
                ),
            });
        }
    }

    for suffix in &config.loader.last_sorted_suffixes {
        if suffix.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "loader.last_sorted_suffixes entries must not be empty".to_string(),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_paths(errors: &mut Vec<ConfigError>, key: &str, paths: &[String]) {
    let mut seen = HashSet::new();
    for (i, path) in paths.iter().enumerate() {
        if path.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key}[{i}] must not be empty"),
            });
        } else if !seen.insert(path.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("{key} lists `{path}` more than once"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&CorralConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = CorralConfig::default();
        config.loader.builtin_dir = " ".to_string();
        config.packs.paths = vec![String::new()];
        config.logging.level = "loud".to_string();
        config.loader.ignore_extensions = vec!["pyc".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4, "got: {errors:?}");
    }

    #[test]
    fn duplicate_pack_roots_rejected() {
        let mut config = CorralConfig::default();
        config.packs.paths = vec!["/a".to_string(), "/a".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("more than once"));
    }

    #[test]
    fn tilde_is_an_accepted_ignore_suffix() {
        let mut config = CorralConfig::default();
        config.loader.ignore_extensions = vec!["~".to_string(), ".bak".to_string()];
        assert!(validate_config(&config).is_ok());
    }
}
