// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type resolution caches shared by the loaders.
//!
//! Each plugin type owns a [`TypeCache`] holding loaded modules by path, the
//! computed search paths, the legacy name index, and the set of directories
//! already scanned. A [`CacheRegistry`] is created once and handed to every
//! loader; registering a directory at runtime invalidates that type's entry.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use corral_core::{CorralError, PluginType};
use tracing::debug;

use crate::search_path::{SearchPathEntry, SearchPaths};
use crate::source::LoadedModule;

/// Cached state for one plugin type.
#[derive(Debug, Default)]
pub struct TypeCache {
    /// Loaded code units keyed by file path.
    pub modules: HashMap<PathBuf, Arc<LoadedModule>>,
    /// Search paths, computed on first use.
    pub paths: Option<SearchPaths>,
    /// Legacy index: extension bucket (`""` for any) -> name -> location.
    pub plugin_paths: HashMap<String, HashMap<String, SearchPathEntry>>,
    /// Directories the legacy scan has already listed.
    pub searched: HashSet<PathBuf>,
}

impl TypeCache {
    /// Look a name up in one extension bucket.
    pub fn lookup(&self, bucket: &str, name: &str) -> Option<SearchPathEntry> {
        self.plugin_paths.get(bucket)?.get(name).cloned()
    }

    /// Record a location unless the key is already taken.
    pub fn insert_if_absent(&mut self, bucket: &str, name: &str, entry: &SearchPathEntry) {
        self.plugin_paths
            .entry(bucket.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| entry.clone());
    }
}

/// Resolution caches for every plugin type.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    types: Mutex<HashMap<PluginType, TypeCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the cache for `plugin_type`, creating it if needed.
    ///
    /// The lock is held for the duration of `f`; do not resolve plugins inside it.
    pub fn with<R>(
        &self,
        plugin_type: PluginType,
        f: impl FnOnce(&mut TypeCache) -> R,
    ) -> Result<R, CorralError> {
        let mut types = self.lock()?;
        Ok(f(types.entry(plugin_type).or_default()))
    }

    /// Drop everything cached for one plugin type.
    pub fn invalidate(&self, plugin_type: PluginType) -> Result<(), CorralError> {
        self.lock()?.remove(&plugin_type);
        debug!(plugin_type = %plugin_type, "plugin caches invalidated");
        Ok(())
    }

    /// Drop every cached entry for every type.
    pub fn clear_all(&self) -> Result<(), CorralError> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<PluginType, TypeCache>>, CorralError> {
        self.types
            .lock()
            .map_err(|e| CorralError::Internal(format!("failed to lock plugin caches: {e}")))
    }
}
