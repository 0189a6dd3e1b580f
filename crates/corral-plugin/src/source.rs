// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning a resolved plugin file into loadable classes.
//!
//! Loaders never interpret plugin files themselves; they hand the path to a
//! [`ModuleSource`] and get back a [`LoadedModule`] of named exports. The
//! bundled [`ManifestSource`] reads TOML manifests that bind export names to
//! classes compiled into the host:
//!
//! ```toml
//! [[exports]]
//! name = "LookupModule"
//! implementation = "builtin.env"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use corral_core::{CorralError, PluginClass};
use serde::Deserialize;

/// A plugin file after loading: its named class exports.
#[derive(Debug)]
pub struct LoadedModule {
    pub name: String,
    pub path: PathBuf,
    exports: BTreeMap<String, Arc<dyn PluginClass>>,
}

impl LoadedModule {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn with_export(mut self, name: impl Into<String>, class: Arc<dyn PluginClass>) -> Self {
        self.exports.insert(name.into(), class);
        self
    }

    pub fn export(&self, name: &str) -> Option<Arc<dyn PluginClass>> {
        self.exports.get(name).cloned()
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// Loads the code unit behind a resolved plugin path.
pub trait ModuleSource: Send + Sync {
    /// Load the file at `path`, known to callers as `module_name`.
    fn load(&self, module_name: &str, path: &Path) -> Result<LoadedModule, CorralError>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    exports: Vec<ManifestExport>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestExport {
    name: String,
    implementation: String,
}

/// Reads TOML export manifests and binds them to registered implementations.
#[derive(Default)]
pub struct ManifestSource {
    implementations: HashMap<String, Arc<dyn PluginClass>>,
}

impl ManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under the key manifests refer to it by.
    pub fn with_implementation(mut self, key: impl Into<String>, class: Arc<dyn PluginClass>) -> Self {
        self.implementations.insert(key.into(), class);
        self
    }

    pub fn register(&mut self, key: impl Into<String>, class: Arc<dyn PluginClass>) {
        self.implementations.insert(key.into(), class);
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    /// Parse manifest text without touching the filesystem.
    pub fn load_str(&self, module_name: &str, path: &Path, content: &str) -> Result<LoadedModule, CorralError> {
        let load_error = |message: String| CorralError::Load {
            path: path.to_path_buf(),
            message,
        };

        let manifest: ManifestFile =
            toml::from_str(content).map_err(|e| load_error(format!("invalid plugin manifest: {e}")))?;

        let mut module = LoadedModule::new(module_name, path);
        for export in manifest.exports {
            if export.name.is_empty() {
                return Err(load_error("export name must not be empty".to_string()));
            }
            let class = self
                .implementations
                .get(&export.implementation)
                .cloned()
                .ok_or_else(|| load_error(format!("unknown implementation `{}`", export.implementation)))?;
            module = module.with_export(export.name, class);
        }
        Ok(module)
    }
}

impl ModuleSource for ManifestSource {
    fn load(&self, module_name: &str, path: &Path) -> Result<LoadedModule, CorralError> {
        let content = std::fs::read_to_string(path).map_err(|e| CorralError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_str(module_name, path, &content)
    }
}

impl std::fmt::Debug for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.implementations.keys().collect();
        keys.sort();
        f.debug_struct("ManifestSource")
            .field("implementations", &keys)
            .finish()
    }
}
