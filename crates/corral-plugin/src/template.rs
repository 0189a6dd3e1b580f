// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loader for function-table plugin types (filters and tests).
//!
//! A filter or test plugin file exports a table of named functions. Requests
//! name a single function, so resolution looks up the function rather than the
//! file: flat search paths are flattened into one function map up front, and
//! pack functions are found by scanning the modules of the pack's plugin
//! package for a matching entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use corral_core::{
    is_valid_fqcr, CorralError, PluginRef, PluginType, TemplateFunction, BUILTIN_PACK,
    LEGACY_PREFIX,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::PluginLoadContext;
use crate::loader::{GetOptions, PluginLoader};

/// One callable function from a filter or test plugin.
#[derive(Clone)]
pub struct TemplatePlugin {
    name: String,
    resolved: String,
    path: PathBuf,
    function: TemplateFunction,
}

impl TemplatePlugin {
    /// Name the function was requested by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name of the function that answered.
    pub fn resolved_name(&self) -> &str {
        &self.resolved
    }

    /// File that exports the function.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CorralError> {
        (self.function)(args)
    }

    fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for TemplatePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplatePlugin")
            .field("name", &self.name)
            .field("resolved", &self.resolved)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A function lookup result and the resolution record behind it.
#[derive(Debug, Clone)]
pub struct TemplateLoadResult {
    pub plugin: Option<TemplatePlugin>,
    pub context: PluginLoadContext,
}

/// Resolves individual functions out of filter or test plugin files.
pub struct TemplatePluginLoader {
    base: PluginLoader,
    wrappers: Mutex<Option<BTreeMap<String, TemplatePlugin>>>,
}

impl TemplatePluginLoader {
    pub fn new(base: PluginLoader) -> Self {
        Self {
            base,
            wrappers: Mutex::new(None),
        }
    }

    /// The file-level loader underneath.
    pub fn base(&self) -> &PluginLoader {
        &self.base
    }

    pub fn plugin_type(&self) -> PluginType {
        self.base.plugin_type()
    }

    /// Resolve a single function by short, legacy-qualified or fully qualified name.
    pub fn get_with_context(&self, name: &str) -> Result<TemplateLoadResult, CorralError> {
        let plugin_type = self.plugin_type();
        let mut ctx = PluginLoadContext::new(plugin_type);
        ctx.original_name = Some(name.to_string());

        let lookup = name.strip_prefix(LEGACY_PREFIX).unwrap_or(name);
        if let Some(plugin) = self.wrappers()?.as_ref().and_then(|m| m.get(lookup)).cloned() {
            ctx.resolve_known(name, plugin.path(), plugin.resolved_name());
            return Ok(TemplateLoadResult {
                plugin: Some(plugin.renamed(name)),
                context: ctx,
            });
        }

        let mut key = if name.contains('.') {
            name.to_string()
        } else {
            format!("{BUILTIN_PACK}.{name}")
        };

        let plugin_ref = loop {
            if ctx.redirect_list.contains(&key) {
                let mut chain = ctx.redirect_list.clone();
                chain.push(key);
                return Err(CorralError::CircularRedirect {
                    name: name.to_string(),
                    chain,
                });
            }
            ctx.redirect_list.push(key.clone());

            let plugin_ref = match PluginRef::from_fqcr(&key, plugin_type) {
                Ok(r) => r,
                Err(e) => {
                    ctx.nope(format!("invalid plugin name: {key}"));
                    ctx.errors.push(Arc::new(e));
                    return Ok(TemplateLoadResult {
                        plugin: None,
                        context: ctx,
                    });
                }
            };

            let metadata = match self.base.finder().pack_metadata(&plugin_ref.pack) {
                Ok(metadata) => metadata,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    ctx.nope(format!("pack {} not found", plugin_ref.pack));
                    ctx.errors.push(Arc::new(e));
                    return Ok(TemplateLoadResult {
                        plugin: None,
                        context: ctx,
                    });
                }
            };

            let Some(entry) = metadata.plugin_entry(plugin_type, &plugin_ref.resource, None) else {
                break plugin_ref;
            };

            if let Some(tombstone) = &entry.tombstone {
                return Err(CorralError::removed(
                    &key,
                    tombstone.warning_text.as_deref(),
                    tombstone.removal_version.clone(),
                    tombstone.removal_date.clone(),
                ));
            }
            if let Some(deprecation) = &entry.deprecation {
                ctx.record_deprecation(&key, deprecation);
            }

            match entry.redirect.as_deref().filter(|r| !r.is_empty()) {
                Some(target) if !target.contains('.') => {
                    debug!(from = %key, to = %target, "following function redirect within pack");
                    key = format!("{}.{target}", plugin_ref.pack);
                }
                Some(target) if is_valid_fqcr(target) => {
                    debug!(from = %key, to = %target, "following function redirect");
                    key = target.to_string();
                }
                Some(target) => {
                    return Err(CorralError::InvalidRedirect {
                        name: key,
                        target: target.to_string(),
                    });
                }
                None => break plugin_ref,
            }
        };

        let package = plugin_ref.package_name();
        let modules = match self.base.finder().iter_modules(&package) {
            Ok(modules) => modules,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                ctx.nope(format!("package {package} not found"));
                ctx.errors.push(Arc::new(e));
                return Ok(TemplateLoadResult {
                    plugin: None,
                    context: ctx,
                });
            }
        };

        let prefix = if plugin_ref.subdirs.is_empty() {
            plugin_ref.pack.clone()
        } else {
            format!("{}.{}", plugin_ref.pack, plugin_ref.subdirs)
        };

        let mut found = None;
        for module in modules.iter().filter(|m| !m.is_package) {
            let module_name = format!("{prefix}.{}", module.name);
            ctx.load_attempts.push(module_name.clone());

            let handle = match self.base.get_with_context(&module_name, &GetOptions::default()) {
                Ok(result) => match result.plugin {
                    Some(handle) => handle,
                    None => continue,
                },
                Err(e) => {
                    warn!(module = %module_name, error = %e, "skipping plugin file");
                    continue;
                }
            };

            for (func_name, function) in handle.functions().unwrap_or_default() {
                if func_name != key && format!("{prefix}.{func_name}") != key {
                    continue;
                }
                if found.is_some() {
                    debug!(function = %key, path = %handle.path().display(), "later plugin file overrides function");
                }
                found = Some(TemplatePlugin {
                    name: name.to_string(),
                    resolved: key.clone(),
                    path: handle.path().to_path_buf(),
                    function,
                });
            }
        }

        match found {
            Some(plugin) => {
                ctx.resolve(
                    key.clone(),
                    plugin.path().to_path_buf(),
                    plugin_ref.pack.as_str(),
                    format!("found {key} in {package}"),
                    None,
                );
                ctx.set_resolved_fqcn(key);
                Ok(TemplateLoadResult {
                    plugin: Some(plugin),
                    context: ctx,
                })
            }
            None => {
                ctx.nope(format!("{key} not found in {package}"));
                Ok(TemplateLoadResult {
                    plugin: None,
                    context: ctx,
                })
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Option<TemplatePlugin>, CorralError> {
        Ok(self.get_with_context(name)?.plugin)
    }

    /// Every function exposed by the flat search paths, keyed by each name it
    /// answers to.
    pub fn all(&self) -> Result<Vec<TemplatePlugin>, CorralError> {
        Ok(self
            .wrappers()?
            .as_ref()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn add_directory(&self, dir: &Path, with_subdir: bool) -> Result<(), CorralError> {
        self.base.add_directory(dir, with_subdir)?;
        self.reset()
    }

    pub fn search_paths(&self) -> Result<Vec<PathBuf>, CorralError> {
        self.base.search_paths()
    }

    pub fn print_paths(&self) -> Result<String, CorralError> {
        self.base.print_paths()
    }

    pub fn clear_caches(&self) -> Result<(), CorralError> {
        self.base.clear_caches()?;
        self.reset()
    }

    fn reset(&self) -> Result<(), CorralError> {
        *self.lock()? = None;
        Ok(())
    }

    /// The flattened function map, built on first use.
    fn wrappers(&self) -> Result<MutexGuard<'_, Option<BTreeMap<String, TemplatePlugin>>>, CorralError> {
        if self.lock()?.is_none() {
            let built = self.build_wrappers()?;
            let mut guard = self.lock()?;
            if guard.is_none() {
                *guard = Some(built);
            }
            return Ok(guard);
        }
        self.lock()
    }

    fn build_wrappers(&self) -> Result<BTreeMap<String, TemplatePlugin>, CorralError> {
        let plugin_type = self.plugin_type();
        let mut map: BTreeMap<String, TemplatePlugin> = BTreeMap::new();

        for handle in self.base.all_files()? {
            let Some(functions) = handle.functions() else {
                debug!(path = %handle.path().display(), "plugin file exports no functions");
                continue;
            };

            let owner = handle.name();
            let pack = if owner.matches('.').count() >= 2 {
                owner.splitn(3, '.').take(2).collect::<Vec<_>>().join(".")
            } else {
                String::new()
            };

            for (func_name, function) in functions {
                if func_name.contains('.') {
                    debug!(function = %func_name, "skipping dotted function name");
                    continue;
                }
                if self.base.filters().is_rejected(plugin_type, &func_name) {
                    debug!(function = %func_name, "function rejected by filter");
                    continue;
                }

                let fqcn = if pack.is_empty() || func_name.starts_with(&pack) {
                    func_name.clone()
                } else {
                    format!("{pack}.{func_name}")
                };
                let mut targets = vec![func_name.clone(), fqcn.clone()];
                if owner.starts_with(&format!("{BUILTIN_PACK}.")) {
                    targets.push(format!("{BUILTIN_PACK}.{func_name}"));
                }
                targets.dedup();

                for target in targets {
                    if let Some(existing) = map.get(&target) {
                        if existing.path() != handle.path() {
                            debug!(
                                function = %target,
                                winner = %existing.path().display(),
                                shadowed = %handle.path().display(),
                                "function shadowed by earlier plugin file"
                            );
                        }
                        continue;
                    }
                    map.insert(
                        target.clone(),
                        TemplatePlugin {
                            name: target,
                            resolved: fqcn.clone(),
                            path: handle.path().to_path_buf(),
                            function: function.clone(),
                        },
                    );
                }
            }
        }

        Ok(map)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<BTreeMap<String, TemplatePlugin>>>, CorralError> {
        self.wrappers
            .lock()
            .map_err(|e| CorralError::Internal(format!("failed to lock function table: {e}")))
    }
}

impl std::fmt::Debug for TemplatePluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplatePluginLoader")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::loader::PluginKind;
    use crate::source::ManifestSource;
    use corral_collection::CollectionFinder;
    use corral_test_utils::{manifest, FunctionClass, PackTree};
    use serde_json::json;

    fn filter_loader(tree: &PackTree, dirs: Vec<PathBuf>) -> TemplatePluginLoader {
        let finder = Arc::new(CollectionFinder::new([tree.path().join("none")]));
        let source = ManifestSource::new()
            .with_implementation("text", Arc::new(FunctionClass::new("FilterModule", "text", &["upper", "lower"])))
            .with_implementation("more", Arc::new(FunctionClass::new("FilterModule", "more", &["upper", "trim"])));
        let base = PluginLoader::new(
            PluginKind::standard(PluginType::Filter),
            finder,
            Arc::new(CacheRegistry::new()),
            Arc::new(source),
        )
        .with_configured_paths(dirs);
        TemplatePluginLoader::new(base)
    }

    #[test]
    fn flat_functions_are_flattened() {
        let tree = PackTree::new();
        let dir = tree.dir("filter");
        tree.write("filter/a_text.toml", &manifest(&[("FilterModule", "text")]));
        tree.write("filter/b_more.toml", &manifest(&[("FilterModule", "more")]));

        let loader = filter_loader(&tree, vec![dir]);
        let names: Vec<String> = loader.all().unwrap().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["lower", "trim", "upper"]);

        let upper = loader.get("upper").unwrap().unwrap();
        assert!(upper.path().ends_with("a_text.toml"));
        assert_eq!(upper.call(&[json!("x")]).unwrap(), json!("text:upper:x"));
    }

    #[test]
    fn legacy_prefix_is_stripped() {
        let tree = PackTree::new();
        let dir = tree.dir("filter");
        tree.write("filter/text.toml", &manifest(&[("FilterModule", "text")]));

        let loader = filter_loader(&tree, vec![dir]);
        let result = loader.get_with_context("corral.legacy.lower").unwrap();
        let plugin = result.plugin.unwrap();
        assert_eq!(plugin.name(), "corral.legacy.lower");
        assert!(result.context.resolved);
    }

    #[test]
    fn unknown_function_is_not_found() {
        let tree = PackTree::new();
        let dir = tree.dir("filter");
        tree.write("filter/text.toml", &manifest(&[("FilterModule", "text")]));

        let loader = filter_loader(&tree, vec![dir]);
        let result = loader.get_with_context("missing").unwrap();
        assert!(result.plugin.is_none());
        assert!(!result.context.resolved);
    }

    #[test]
    fn new_directory_resets_function_table() {
        let tree = PackTree::new();
        let dir = tree.dir("filter");
        tree.write("filter/text.toml", &manifest(&[("FilterModule", "text")]));
        let loader = filter_loader(&tree, vec![dir]);
        assert!(loader.get("trim").unwrap().is_none());

        tree.write("extra/more.toml", &manifest(&[("FilterModule", "more")]));
        loader.add_directory(&tree.path().join("extra"), false).unwrap();
        assert!(loader.get("trim").unwrap().is_some());
    }
}
