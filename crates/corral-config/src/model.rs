// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Corral plugin loader.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use corral_core::PluginType;
use serde::{Deserialize, Serialize};

/// Top-level Corral configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorralConfig {
    /// Plugin loader and search path settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Content pack roots and compatibility policy.
    #[serde(default)]
    pub packs: PacksConfig,

    /// Explicit flat plugin directories per plugin type.
    #[serde(default)]
    pub plugin_paths: PluginPathsConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CorralConfig {
    /// Configured flat directories for one plugin type.
    ///
    /// Explicit `[plugin_paths]` entries win; otherwise every
    /// `loader.plugin_roots` entry contributes `<root>/<type>`.
    pub fn configured_plugin_paths(&self, plugin_type: PluginType) -> Vec<String> {
        let explicit = self.plugin_paths.for_type(plugin_type);
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
        self.loader
            .plugin_roots
            .iter()
            .map(|root| format!("{}/{}", root.trim_end_matches('/'), plugin_type))
            .collect()
    }
}

/// Plugin loader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Directory holding the plugins that ship with Corral, one subdirectory per type.
    #[serde(default = "default_builtin_dir")]
    pub builtin_dir: String,

    /// Routing metadata for the built-in pack. Defaults to `<builtin_dir>/runtime.toml`.
    #[serde(default)]
    pub builtin_runtime: Option<String>,

    /// Roots that contribute `<root>/<type>` when a type has no explicit paths.
    #[serde(default = "default_plugin_roots")]
    pub plugin_roots: Vec<String>,

    /// File suffixes never considered plugins during directory scans.
    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,

    /// Search path entries ending in one of these suffixes sort after all others.
    #[serde(default = "default_last_sorted_suffixes")]
    pub last_sorted_suffixes: Vec<String>,

    /// Plugin reject-list file. When unset, the system default is used if present.
    #[serde(default)]
    pub filter_file: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            builtin_dir: default_builtin_dir(),
            builtin_runtime: None,
            plugin_roots: default_plugin_roots(),
            ignore_extensions: default_ignore_extensions(),
            last_sorted_suffixes: default_last_sorted_suffixes(),
            filter_file: None,
        }
    }
}

impl LoaderConfig {
    /// The built-in routing metadata file, explicit or derived.
    pub fn builtin_runtime_path(&self) -> String {
        self.builtin_runtime.clone().unwrap_or_else(|| {
            format!("{}/runtime.toml", self.builtin_dir.trim_end_matches('/'))
        })
    }
}

fn default_builtin_dir() -> String {
    "/usr/share/corral/builtin".to_string()
}

fn default_plugin_roots() -> Vec<String> {
    vec![
        "~/.corral/plugins".to_string(),
        "/usr/share/corral/plugins".to_string(),
    ]
}

fn default_ignore_extensions() -> Vec<String> {
    [".pyc", ".pyo", ".swp", ".bak", "~", ".rpm", ".md", ".txt", ".rst"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_last_sorted_suffixes() -> Vec<String> {
    vec!["/windows".to_string()]
}

/// What to do when a pack declares a runtime requirement this build does not meet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchBehavior {
    Ignore,
    #[default]
    Warning,
    Error,
}

/// Content pack configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PacksConfig {
    /// Roots searched in order; each must contain a `packs/` directory to count.
    #[serde(default = "default_pack_paths")]
    pub paths: Vec<String>,

    /// Policy for `requires_corral` mismatches.
    #[serde(default)]
    pub on_version_mismatch: MismatchBehavior,
}

impl Default for PacksConfig {
    fn default() -> Self {
        Self {
            paths: default_pack_paths(),
            on_version_mismatch: MismatchBehavior::default(),
        }
    }
}

fn default_pack_paths() -> Vec<String> {
    vec![
        "~/.corral/packs".to_string(),
        "/usr/share/corral/packs".to_string(),
    ]
}

/// Explicit flat plugin directories, one list per plugin type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginPathsConfig {
    #[serde(default)]
    pub action: Vec<String>,
    #[serde(default)]
    pub r#become: Vec<String>,
    #[serde(default)]
    pub cache: Vec<String>,
    #[serde(default)]
    pub callback: Vec<String>,
    #[serde(default)]
    pub cliconf: Vec<String>,
    #[serde(default)]
    pub connection: Vec<String>,
    #[serde(default)]
    pub doc_fragments: Vec<String>,
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub httpapi: Vec<String>,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub lookup: Vec<String>,
    #[serde(default)]
    pub module_utils: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub netconf: Vec<String>,
    #[serde(default)]
    pub shell: Vec<String>,
    #[serde(default)]
    pub strategy: Vec<String>,
    #[serde(default)]
    pub terminal: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub vars: Vec<String>,
}

impl PluginPathsConfig {
    /// The configured list for one plugin type.
    pub fn for_type(&self, plugin_type: PluginType) -> &[String] {
        match plugin_type {
            PluginType::Action => &self.action,
            PluginType::Become => &self.r#become,
            PluginType::Cache => &self.cache,
            PluginType::Callback => &self.callback,
            PluginType::Cliconf => &self.cliconf,
            PluginType::Connection => &self.connection,
            PluginType::DocFragments => &self.doc_fragments,
            PluginType::Filter => &self.filter,
            PluginType::Httpapi => &self.httpapi,
            PluginType::Inventory => &self.inventory,
            PluginType::Lookup => &self.lookup,
            PluginType::ModuleUtils => &self.module_utils,
            PluginType::Modules => &self.modules,
            PluginType::Netconf => &self.netconf,
            PluginType::Shell => &self.shell,
            PluginType::Strategy => &self.strategy,
            PluginType::Terminal => &self.terminal,
            PluginType::Test => &self.test,
            PluginType::Vars => &self.vars,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
