// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./corral.toml` > `~/.config/corral/corral.toml` > `/etc/corral/corral.toml`
//! with environment variable overrides via `CORRAL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CorralConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG: &str = "/etc/corral/corral.toml";

/// Config sections addressable from the environment, longest first so that
/// `plugin_paths_` wins over any shorter prefix.
const ENV_SECTIONS: &[&str] = &["plugin_paths", "logging", "loader", "packs"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/corral/corral.toml` (system-wide)
/// 3. `~/.config/corral/corral.toml` (user XDG config)
/// 4. `./corral.toml` (local directory)
/// 5. `CORRAL_*` environment variables
pub fn load_config() -> Result<CorralConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CorralConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CorralConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CorralConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CorralConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CorralConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("corral/corral.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("corral.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `CORRAL_LOADER_BUILTIN_DIR`
/// must become `loader.builtin_dir`, not `loader.builtin.dir`.
fn env_provider() -> Env {
    Env::prefixed("CORRAL_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env var name to a dotted, lowercase config key.
///
/// Figment hands `map` the raw variable name, so case is folded here.
pub fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("loader_builtin_dir"), "loader.builtin_dir");
        assert_eq!(map_env_key("packs_on_version_mismatch"), "packs.on_version_mismatch");
        assert_eq!(map_env_key("plugin_paths_module_utils"), "plugin_paths.module_utils");
        assert_eq!(map_env_key("logging_level"), "logging.level");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_keys_are_case_folded() {
        assert_eq!(map_env_key("LOGGING_LEVEL"), "logging.level");
        assert_eq!(map_env_key("PLUGIN_PATHS_MODULE_UTILS"), "plugin_paths.module_utils");
        assert_eq!(map_env_key("Loader_Builtin_Dir"), "loader.builtin_dir");
    }
}
