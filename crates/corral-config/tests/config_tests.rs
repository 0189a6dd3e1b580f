// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Corral configuration system.

use corral_config::diagnostic::ConfigError;
use corral_config::model::CorralConfig;
use corral_config::{load_and_validate_str, load_config_from_str, MismatchBehavior};
use corral_core::PluginType;

/// Valid TOML with all sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_corral_config() {
    let toml = r#"
[loader]
builtin_dir = "/opt/corral/builtin"
builtin_runtime = "/opt/corral/runtime.toml"
plugin_roots = ["/opt/plugins"]
ignore_extensions = [".bak"]
last_sorted_suffixes = ["/windows", "/legacy"]
filter_file = "/etc/corral/filters.toml"

[packs]
paths = ["/srv/packs", "/usr/share/corral/packs"]
on_version_mismatch = "error"

[plugin_paths]
lookup = ["/srv/lookup"]
become = ["/srv/become"]

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.loader.builtin_dir, "/opt/corral/builtin");
    assert_eq!(config.loader.builtin_runtime_path(), "/opt/corral/runtime.toml");
    assert_eq!(config.loader.last_sorted_suffixes, vec!["/windows", "/legacy"]);
    assert_eq!(config.packs.paths.len(), 2);
    assert_eq!(config.packs.on_version_mismatch, MismatchBehavior::Error);
    assert_eq!(config.plugin_paths.for_type(PluginType::Lookup), ["/srv/lookup"]);
    assert_eq!(config.plugin_paths.for_type(PluginType::Become), ["/srv/become"]);
    assert_eq!(config.logging.level, "debug");
}

/// Missing sections fall back to compiled defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.loader.builtin_dir, "/usr/share/corral/builtin");
    assert_eq!(config.loader.last_sorted_suffixes, vec!["/windows"]);
    assert_eq!(config.packs.on_version_mismatch, MismatchBehavior::Warning);
    assert!(config.loader.ignore_extensions.contains(&".pyc".to_string()));
    assert!(config.loader.filter_file.is_none());
}

/// Unknown key in [packs] is reported with a suggestion.
#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[packs]
pahts = ["/srv/packs"]
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "pahts"
                && suggestion.as_deref() == Some("paths")
                && valid_keys.contains("on_version_mismatch")
        })
    });
    assert!(found, "expected UnknownKey for `pahts`, got: {errors:?}");
}

/// Unknown top-level sections are rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[collections]
paths = []
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown section must fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "collections")));
}

/// A bad mismatch policy surfaces as a diagnostic, not a panic.
#[test]
fn invalid_mismatch_policy_is_reported() {
    let toml = r#"
[packs]
on_version_mismatch = "explode"
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid enum must fail");
    assert!(!errors.is_empty());
    assert!(errors[0].to_string().contains("on_version_mismatch") || errors[0].to_string().contains("explode"));
}

/// Dotted overrides (how `CORRAL_*` env vars arrive) reach nested keys.
#[test]
fn dotted_override_sets_nested_key() {
    use figment::{providers::Serialized, Figment};

    let config: CorralConfig = Figment::new()
        .merge(Serialized::defaults(CorralConfig::default()))
        .merge(("loader.builtin_dir", "/from/env"))
        .merge(("plugin_paths.module_utils", vec!["/env/module_utils"]))
        .extract()
        .expect("dotted keys should merge");

    assert_eq!(config.loader.builtin_dir, "/from/env");
    assert_eq!(config.plugin_paths.module_utils, vec!["/env/module_utils"]);
}

/// Real environment variables are picked up by the file loader.
#[test]
#[serial_test::serial]
fn env_var_overrides_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corral.toml");
    std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

    // SAFETY: serialized with other env-mutating tests.
    unsafe { std::env::set_var("CORRAL_LOGGING_LEVEL", "trace") };
    let config = corral_config::load_config_from_path(&path);
    unsafe { std::env::remove_var("CORRAL_LOGGING_LEVEL") };

    assert_eq!(config.expect("should load").logging.level, "trace");
}

/// Section names containing underscores still map to nested keys.
#[test]
#[serial_test::serial]
fn env_var_overrides_nested_section_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corral.toml");
    std::fs::write(&path, "").unwrap();

    // SAFETY: serialized with other env-mutating tests.
    unsafe { std::env::set_var("CORRAL_LOADER_BUILTIN_DIR", "/from/env") };
    let config = corral_config::load_config_from_path(&path);
    unsafe { std::env::remove_var("CORRAL_LOADER_BUILTIN_DIR") };

    assert_eq!(config.expect("should load").loader.builtin_dir, "/from/env");
}

/// Validation errors are collected rather than returned one at a time.
#[test]
fn validation_collects_all_errors() {
    let toml = r#"
[loader]
builtin_dir = ""
ignore_extensions = ["bak"]

[logging]
level = "chatty"
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid values must fail");
    assert_eq!(errors.len(), 3, "got: {errors:?}");
}

/// ConfigError renders through miette without losing the message.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let err = ConfigError::Validation {
        message: "packs.paths[0] must not be empty".to_string(),
    };
    let mut out = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut out, &err)
        .expect("render should succeed");
    assert!(out.contains("packs.paths[0] must not be empty"));
}
