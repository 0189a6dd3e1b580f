// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The full set of loaders, one per plugin type, wired from configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use corral_collection::{registry, CollectionFinder};
use corral_config::{expand_path, CorralConfig};
use corral_core::{CorralError, PluginType};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::cache::CacheRegistry;
use crate::filter::PluginFilters;
use crate::loader::{PluginKind, PluginLoader};
use crate::source::ModuleSource;
use crate::template::TemplatePluginLoader;
use crate::version::VersionGate;

/// Every plugin loader, sharing one finder, cache registry and filter set.
#[derive(Debug)]
pub struct PluginLoaders {
    finder: Arc<CollectionFinder>,
    caches: Arc<CacheRegistry>,
    filters: Arc<PluginFilters>,
    loaders: HashMap<PluginType, PluginLoader>,
    filter: TemplatePluginLoader,
    test: TemplatePluginLoader,
}

impl PluginLoaders {
    /// Build the finder, version gate, filters and loaders from configuration.
    pub fn from_config(
        config: &CorralConfig,
        source: Arc<dyn ModuleSource>,
    ) -> Result<Self, CorralError> {
        let finder = Arc::new(CollectionFinder::from_config(config));
        finder.subscribe(Arc::new(VersionGate::new(config.packs.on_version_mismatch)));

        let filter_file = config.loader.filter_file.as_deref().map(expand_path);
        let filters = Arc::new(PluginFilters::load(filter_file.as_deref())?);

        info!(
            pack_roots = finder.configured_roots().len(),
            builtin_dir = %config.loader.builtin_dir,
            "plugin loaders configured"
        );
        Ok(Self::with_finder(config, finder, filters, source))
    }

    /// Build loaders around an existing finder.
    pub fn with_finder(
        config: &CorralConfig,
        finder: Arc<CollectionFinder>,
        filters: Arc<PluginFilters>,
        source: Arc<dyn ModuleSource>,
    ) -> Self {
        let caches = Arc::new(CacheRegistry::new());
        let builtin_dir = absolute(expand_path(&config.loader.builtin_dir));

        let build = |plugin_type: PluginType| {
            let configured = config
                .configured_plugin_paths(plugin_type)
                .iter()
                .map(|p| absolute(expand_path(p)))
                .collect();
            PluginLoader::new(
                PluginKind::standard(plugin_type),
                finder.clone(),
                caches.clone(),
                source.clone(),
            )
            .with_configured_paths(configured)
            .with_builtin_dir(builtin_dir.join(plugin_type.as_str()))
            .with_ignore_extensions(config.loader.ignore_extensions.clone())
            .with_last_sorted_suffixes(config.loader.last_sorted_suffixes.clone())
            .with_filters(filters.clone())
        };

        let loaders = PluginType::iter()
            .filter(|t| !t.is_function_table())
            .map(|t| (t, build(t)))
            .collect();
        let filter = TemplatePluginLoader::new(build(PluginType::Filter));
        let test = TemplatePluginLoader::new(build(PluginType::Test));

        Self {
            finder,
            caches,
            filters,
            loaders,
            filter,
            test,
        }
    }

    /// The file-level loader for a type. For filters and tests this is the
    /// loader underneath the function table.
    pub fn loader(&self, plugin_type: PluginType) -> Option<&PluginLoader> {
        match plugin_type {
            PluginType::Filter => Some(self.filter.base()),
            PluginType::Test => Some(self.test.base()),
            other => self.loaders.get(&other),
        }
    }

    pub fn filter(&self) -> &TemplatePluginLoader {
        &self.filter
    }

    pub fn test(&self) -> &TemplatePluginLoader {
        &self.test
    }

    pub fn finder(&self) -> &Arc<CollectionFinder> {
        &self.finder
    }

    pub fn caches(&self) -> &Arc<CacheRegistry> {
        &self.caches
    }

    pub fn filters(&self) -> &PluginFilters {
        &self.filters
    }

    /// Register a directory with one loader.
    pub fn add_directory(
        &self,
        plugin_type: PluginType,
        dir: &Path,
        with_subdir: bool,
    ) -> Result<(), CorralError> {
        match plugin_type {
            PluginType::Filter => self.filter.add_directory(dir, with_subdir),
            PluginType::Test => self.test.add_directory(dir, with_subdir),
            other => match self.loaders.get(&other) {
                Some(loader) => loader.add_directory(dir, with_subdir),
                None => Err(CorralError::Internal(format!("no loader for {other}"))),
            },
        }
    }

    /// Add every `<path>/<legacy subdir>` that exists to its loader.
    pub fn add_all_plugin_dirs(&self, path: &str) -> Result<(), CorralError> {
        let base = expand_path(path);
        if !base.is_dir() {
            warn!(path = %base.display(), "ignoring invalid plugin directory");
            return Ok(());
        }

        for plugin_type in PluginType::iter() {
            let subdir = base.join(plugin_type.legacy_dir());
            if subdir.is_dir() {
                debug!(plugin_type = %plugin_type, path = %subdir.display(), "adding plugin subdirectory");
                self.add_directory(plugin_type, &subdir, false)?;
            }
        }
        Ok(())
    }

    /// Add each path's legacy subdirectory to one loader.
    pub fn add_dirs_to_loader(
        &self,
        plugin_type: PluginType,
        paths: &[PathBuf],
    ) -> Result<(), CorralError> {
        for path in paths {
            self.add_directory(plugin_type, path, true)?;
        }
        Ok(())
    }

    /// Drop every loader's caches.
    pub fn clear_caches(&self) -> Result<(), CorralError> {
        for loader in self.loaders.values() {
            loader.clear_caches()?;
        }
        self.filter.clear_caches()?;
        self.test.clear_caches()
    }

    /// Make this set's finder the process-wide one.
    pub fn install(&self) -> Option<Arc<CollectionFinder>> {
        registry::install(self.finder.clone())
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ManifestSource;
    use corral_test_utils::PackTree;

    fn config_for(tree: &PackTree) -> CorralConfig {
        let mut config = CorralConfig::default();
        config.loader.builtin_dir = tree.dir("builtin").display().to_string();
        config.loader.plugin_roots = vec![tree.dir("plugins").display().to_string()];
        config.packs.paths = vec![tree.root("site").display().to_string()];
        config
    }

    fn loaders(config: &CorralConfig) -> PluginLoaders {
        let finder = Arc::new(CollectionFinder::from_config(config));
        PluginLoaders::with_finder(
            config,
            finder,
            Arc::new(PluginFilters::none()),
            Arc::new(ManifestSource::new()),
        )
    }

    #[test]
    fn every_type_has_a_loader() {
        let tree = PackTree::new();
        let set = loaders(&config_for(&tree));
        for plugin_type in PluginType::iter() {
            let loader = set.loader(plugin_type).unwrap();
            assert_eq!(loader.plugin_type(), plugin_type);
        }
    }

    #[test]
    fn configured_paths_follow_plugin_roots() {
        let tree = PackTree::new();
        let config = config_for(&tree);
        let set = loaders(&config);
        let paths = set.loader(PluginType::Lookup).unwrap().search_paths().unwrap();
        assert!(paths.contains(&tree.path().join("plugins").join("lookup")));
        assert!(paths.contains(&tree.path().join("builtin").join("lookup")));
    }

    #[test]
    fn add_all_plugin_dirs_picks_existing_subdirs() {
        let tree = PackTree::new();
        let set = loaders(&config_for(&tree));
        tree.dir("project/library");
        tree.dir("project/filter_plugins");

        set.add_all_plugin_dirs(&tree.path().join("project").display().to_string())
            .unwrap();

        let project = std::fs::canonicalize(tree.path().join("project")).unwrap();
        let modules = set.loader(PluginType::Modules).unwrap().search_paths().unwrap();
        assert_eq!(modules.first(), Some(&project.join("library")));
        let filters = set.filter().search_paths().unwrap();
        assert_eq!(filters.first(), Some(&project.join("filter_plugins")));
        let lookups = set.loader(PluginType::Lookup).unwrap().search_paths().unwrap();
        assert!(!lookups.iter().any(|p| p.starts_with(&project)));
    }

    #[test]
    fn missing_plugin_dir_is_ignored() {
        let tree = PackTree::new();
        let set = loaders(&config_for(&tree));
        set.add_all_plugin_dirs(&tree.path().join("nope").display().to_string())
            .unwrap();
    }
}
