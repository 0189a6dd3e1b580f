// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name-to-implementation resolution for one plugin type.
//!
//! A [`PluginLoader`] turns a requested name into a plugin file and, on
//! request, a loaded and instantiated [`PluginHandle`]. Resolution runs in
//! steps; each step either resolves, gives up, or hands off to a redirect
//! target, and the loader repeats until the chain settles:
//!
//! - fully qualified names (`ns.pack.name`), and short names given with a list
//!   of candidate packs, go through the pack's routing metadata and then the
//!   pack's plugin directory;
//! - `corral.legacy.<name>` and other short names scan the flat search paths,
//!   memoizing every file found under several keys;
//! - a short name that no directory provides gets one last try as
//!   `corral.builtin.<name>`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use corral_collection::{CollectionFinder, RemovalNotice};
use corral_config::LoaderConfig;
use corral_core::{
    is_valid_fqcr, Capability, CorralError, PluginRef, PluginType, BUILTIN_PACK, LEGACY_PREFIX,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheRegistry, TypeCache};
use crate::context::PluginLoadContext;
use crate::filter::PluginFilters;
use crate::handle::PluginHandle;
use crate::search_path::{build_search_paths, SearchPathEntry, SearchPathSources, SearchPaths};
use crate::source::{LoadedModule, ModuleSource};

/// File suffix of class-based plugin files.
pub const CLASS_SUFFIX: &str = ".toml";

/// Stem of package marker files, never plugins themselves.
const PACKAGE_INIT_STEM: &str = "__init__";

/// Static description of a loader: what it loads and how it checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginKind {
    pub plugin_type: PluginType,
    /// Export looked up in each loaded file. Empty for file-only types.
    pub class_name: String,
    /// Directory name used when adding whole plugin trees.
    pub legacy_subdir: String,
    pub required_capability: Option<Capability>,
    /// Requested name -> name actually looked up.
    pub aliases: BTreeMap<String, String>,
    /// Whether stateless instances are shared between callers.
    pub cache_instances: bool,
}

impl PluginKind {
    pub fn new(plugin_type: PluginType, class_name: impl Into<String>) -> Self {
        Self {
            plugin_type,
            class_name: class_name.into(),
            legacy_subdir: plugin_type.legacy_dir(),
            required_capability: None,
            aliases: BTreeMap::new(),
            cache_instances: plugin_type == PluginType::Vars,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.required_capability = Some(capability);
        self
    }

    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    /// The stock loader description for a plugin type.
    pub fn standard(plugin_type: PluginType) -> Self {
        use PluginType as T;
        match plugin_type {
            T::Action => Self::new(T::Action, "ActionModule").with_capability(Capability::ActionBase),
            T::Become => Self::new(T::Become, "BecomeModule"),
            T::Cache => Self::new(T::Cache, "CacheModule"),
            T::Callback => {
                Self::new(T::Callback, "CallbackModule").with_capability(Capability::CallbackBase)
            }
            T::Cliconf => Self::new(T::Cliconf, "Cliconf").with_capability(Capability::CliconfBase),
            T::Connection => Self::new(T::Connection, "Connection")
                .with_capability(Capability::ConnectionBase)
                .with_alias("paramiko", "paramiko_ssh"),
            T::DocFragments => Self::new(T::DocFragments, "ModuleDocFragment"),
            T::Filter => Self::new(T::Filter, "FilterModule"),
            T::Httpapi => Self::new(T::Httpapi, "HttpApi").with_capability(Capability::HttpApiBase),
            T::Inventory => Self::new(T::Inventory, "InventoryModule"),
            T::Lookup => Self::new(T::Lookup, "LookupModule").with_capability(Capability::LookupBase),
            T::ModuleUtils => Self::new(T::ModuleUtils, ""),
            T::Modules => Self::new(T::Modules, ""),
            T::Netconf => Self::new(T::Netconf, "Netconf").with_capability(Capability::NetconfBase),
            T::Shell => Self::new(T::Shell, "ShellModule"),
            T::Strategy => {
                Self::new(T::Strategy, "StrategyModule").with_capability(Capability::StrategyBase)
            }
            T::Terminal => {
                Self::new(T::Terminal, "TerminalModule").with_capability(Capability::TerminalBase)
            }
            T::Test => Self::new(T::Test, "TestModule"),
            T::Vars => Self::new(T::Vars, "VarsModule"),
        }
    }
}

/// Options for [`PluginLoader::find_plugin_with_context`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Required file suffix, e.g. `.toml`. Defaults per loader.
    pub mod_type: Option<String>,
    pub ignore_deprecated: bool,
    pub check_aliases: bool,
    /// Packs to qualify a short name with, tried in order.
    pub collection_list: Option<Vec<String>>,
}

/// Options for [`PluginLoader::get_with_context`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Constructor arguments.
    pub args: Value,
    pub class_only: bool,
    pub collection_list: Option<Vec<String>>,
}

/// Options for [`PluginLoader::all`].
#[derive(Debug, Clone)]
pub struct AllOptions {
    /// Keep only the first file for each name.
    pub dedupe: bool,
    pub class_only: bool,
    pub args: Value,
}

impl Default for AllOptions {
    fn default() -> Self {
        Self {
            dedupe: true,
            class_only: false,
            args: Value::Null,
        }
    }
}

/// A plugin (if one was loaded) and the resolution record behind it.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub plugin: Option<PluginHandle>,
    pub context: PluginLoadContext,
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    basename: String,
    internal: bool,
}

impl Candidate {
    /// Files from internal paths answer to `corral.builtin.<name>`.
    fn fqcn(&self) -> String {
        if self.internal {
            format!("{BUILTIN_PACK}.{}", self.basename)
        } else {
            self.basename.clone()
        }
    }
}

/// Resolves and loads plugins of one type.
pub struct PluginLoader {
    kind: PluginKind,
    configured: Vec<PathBuf>,
    builtin_dir: Option<PathBuf>,
    ignore_extensions: Vec<String>,
    last_sorted_suffixes: Vec<String>,
    finder: Arc<CollectionFinder>,
    caches: Arc<CacheRegistry>,
    source: Arc<dyn ModuleSource>,
    filters: Arc<PluginFilters>,
    extra_dirs: Mutex<Vec<PathBuf>>,
    instances: Mutex<HashMap<String, (PluginHandle, PluginLoadContext)>>,
}

impl PluginLoader {
    pub fn new(
        kind: PluginKind,
        finder: Arc<CollectionFinder>,
        caches: Arc<CacheRegistry>,
        source: Arc<dyn ModuleSource>,
    ) -> Self {
        let defaults = LoaderConfig::default();
        Self {
            kind,
            configured: Vec::new(),
            builtin_dir: None,
            ignore_extensions: defaults.ignore_extensions,
            last_sorted_suffixes: defaults.last_sorted_suffixes,
            finder,
            caches,
            source,
            filters: Arc::new(PluginFilters::none()),
            extra_dirs: Mutex::new(Vec::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Configured flat directories, highest priority first.
    pub fn with_configured_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.configured = paths;
        self
    }

    /// Directory of the plugins of this type that ship with Corral.
    pub fn with_builtin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.builtin_dir = Some(dir.into());
        self
    }

    pub fn with_ignore_extensions(mut self, extensions: Vec<String>) -> Self {
        self.ignore_extensions = extensions;
        self
    }

    pub fn with_last_sorted_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.last_sorted_suffixes = suffixes;
        self
    }

    pub fn with_filters(mut self, filters: Arc<PluginFilters>) -> Self {
        self.filters = filters;
        self
    }

    pub fn kind(&self) -> &PluginKind {
        &self.kind
    }

    pub fn plugin_type(&self) -> PluginType {
        self.kind.plugin_type
    }

    pub fn finder(&self) -> &Arc<CollectionFinder> {
        &self.finder
    }

    pub fn filters(&self) -> &PluginFilters {
        &self.filters
    }

    /// Resolve `name` to a plugin file, following redirects.
    ///
    /// Not finding anything is not an error: the returned context is
    /// unresolved and carries an exit reason. Removed plugins, redirect loops,
    /// invalid redirects and unsupported packs are errors.
    pub fn find_plugin_with_context(
        &self,
        name: &str,
        options: &FindOptions,
    ) -> Result<PluginLoadContext, CorralError> {
        let mut ctx = PluginLoadContext::new(self.kind.plugin_type);
        ctx.original_name = Some(name.to_string());
        let mut candidate = name.to_string();

        loop {
            self.resolve_step(&candidate, options, &mut ctx)?;

            if let Some(next) = ctx.pending_redirect.clone() {
                if ctx.redirect_list.contains(&next) {
                    let mut chain = ctx.redirect_list.clone();
                    chain.push(next);
                    return Err(CorralError::CircularRedirect {
                        name: name.to_string(),
                        chain,
                    });
                }
                candidate = next;
                continue;
            }

            for error in &ctx.errors {
                warn!(plugin_type = %self.kind.plugin_type, name = %name, error = %error, "error resolving plugin");
            }
            return Ok(ctx);
        }
    }

    /// Path of the plugin `name` resolves to, if any.
    pub fn find_plugin(
        &self,
        name: &str,
        options: &FindOptions,
    ) -> Result<Option<PathBuf>, CorralError> {
        let ctx = self.find_plugin_with_context(name, options)?;
        Ok(if ctx.resolved { ctx.resolved_path } else { None })
    }

    /// Whether `name` resolves. Only fatal resolution errors are returned.
    pub fn has_plugin(&self, name: &str, packs: Option<&[String]>) -> Result<bool, CorralError> {
        let options = FindOptions {
            collection_list: packs.map(<[String]>::to_vec),
            ..FindOptions::default()
        };
        match self.find_plugin(name, &options) {
            Ok(found) => Ok(found.is_some()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(name = %name, error = %e, "has_plugin lookup failed");
                Ok(false)
            }
        }
    }

    /// Resolve, load, validate and (unless class-only) instantiate `name`.
    ///
    /// Load, export, capability and instantiation failures are recorded on the
    /// returned context and leave `plugin` empty.
    pub fn get_with_context(
        &self,
        name: &str,
        options: &GetOptions,
    ) -> Result<LoadResult, CorralError> {
        let name = self.kind.aliases.get(name).map(String::as_str).unwrap_or(name);
        if let Some(hit) = self.cached_instance(name)? {
            return Ok(hit);
        }

        let find = FindOptions {
            collection_list: options.collection_list.clone(),
            ..FindOptions::default()
        };
        let mut context = self.find_plugin_with_context(name, &find)?;
        let path = match (&context.resolved_path, context.resolved) {
            (Some(path), true) => path.clone(),
            _ => return Ok(LoadResult { plugin: None, context }),
        };

        let mut fqcn = context.resolved_fqcn().unwrap_or_else(|| name.to_string());
        if !fqcn.contains('.')
            && let Some(pack) = context.resolved_pack.as_deref().filter(|p| !p.is_empty())
        {
            fqcn = format!("{pack}.{fqcn}");
        }
        if let Some(hit) = self.cached_instance(&fqcn)? {
            return Ok(hit);
        }

        let load_name = context.resolved_name.clone().unwrap_or_else(|| name.to_string());
        match self.load_handle(
            &load_name,
            &path,
            &fqcn,
            &context.redirect_list,
            options.class_only,
            &options.args,
        ) {
            Ok(handle) => {
                self.remember_instance(&fqcn, &handle, &context)?;
                Ok(LoadResult {
                    plugin: Some(handle),
                    context,
                })
            }
            Err(e) => {
                warn!(plugin = %fqcn, path = %path.display(), error = %e, "unable to load plugin");
                context.errors.push(Arc::new(e));
                Ok(LoadResult {
                    plugin: None,
                    context,
                })
            }
        }
    }

    /// Like [`PluginLoader::get_with_context`], without the context.
    pub fn get(&self, name: &str, options: &GetOptions) -> Result<Option<PluginHandle>, CorralError> {
        Ok(self.get_with_context(name, options)?.plugin)
    }

    /// Every loadable plugin in the flat search paths.
    ///
    /// Files are listed up front; each is loaded only when the iterator reaches
    /// it. Files that fail to load or validate are skipped with a warning.
    pub fn all(
        &self,
        options: AllOptions,
    ) -> Result<impl Iterator<Item = PluginHandle> + '_, CorralError> {
        let matches = self.all_matches(options.dedupe, false)?;
        Ok(self.load_matches(matches, options))
    }

    /// Paths [`PluginLoader::all`] would load, without loading them.
    pub fn all_paths(&self) -> Result<Vec<PathBuf>, CorralError> {
        Ok(self
            .all_matches(true, false)?
            .into_iter()
            .map(|c| c.path)
            .collect())
    }

    /// Every plugin file, deduplicated by path rather than name, loaded.
    pub(crate) fn all_files(&self) -> Result<impl Iterator<Item = PluginHandle> + '_, CorralError> {
        let matches = self.all_matches(true, true)?;
        Ok(self.load_matches(matches, AllOptions::default()))
    }

    /// Register a directory to search ahead of the configured ones.
    ///
    /// With `with_subdir`, the loader's legacy subdirectory of `dir` is added
    /// instead. Registration invalidates this type's caches.
    pub fn add_directory(&self, dir: &Path, with_subdir: bool) -> Result<(), CorralError> {
        let mut directory = std::fs::canonicalize(dir)
            .or_else(|_| std::path::absolute(dir))
            .map_err(|e| CorralError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        if with_subdir {
            directory = directory.join(&self.kind.legacy_subdir);
        }

        let added = {
            let mut extra = self.extra_dirs()?;
            if extra.contains(&directory) {
                false
            } else {
                extra.push(directory.clone());
                true
            }
        };

        if added {
            self.clear_caches()?;
            debug!(plugin_type = %self.kind.plugin_type, path = %directory.display(), "added directory to plugin search path");
        }
        Ok(())
    }

    /// Search paths in order, computed once per cache lifetime.
    pub fn search_paths(&self) -> Result<Vec<PathBuf>, CorralError> {
        Ok(self.search_paths_with_context()?.dirs())
    }

    /// Search path entries with their internal flags.
    pub fn search_paths_with_context(&self) -> Result<SearchPaths, CorralError> {
        let ty = self.kind.plugin_type;
        if let Some(paths) = self.caches.with(ty, |c| c.paths.clone())? {
            return Ok(paths);
        }
        let paths = self.compute_paths(true)?;
        self.caches
            .with(ty, |c| c.paths.get_or_insert(paths).clone())
    }

    /// Top-level search directories joined with `:`.
    pub fn print_paths(&self) -> Result<String, CorralError> {
        Ok(self.compute_paths(false)?.format())
    }

    /// Drop this type's caches and shared instances.
    pub fn clear_caches(&self) -> Result<(), CorralError> {
        self.caches.invalidate(self.kind.plugin_type)?;
        self.instances()?.clear();
        Ok(())
    }

    fn resolve_step(
        &self,
        name: &str,
        options: &FindOptions,
        ctx: &mut PluginLoadContext,
    ) -> Result<(), CorralError> {
        ctx.redirect_list.push(name.to_string());
        ctx.resolved = false;
        ctx.pending_redirect = None;

        if self.filters.is_rejected(self.kind.plugin_type, name) {
            debug!(name = %name, "plugin rejected by filter");
            ctx.nope(format!("{name} matched a defined plugin filter"));
            return Ok(());
        }

        let suffix = self.lookup_suffix(options);
        let packs = options.collection_list.as_deref().filter(|l| !l.is_empty());

        if !is_valid_fqcr(name) && packs.is_none() {
            return self.find_legacy(name, &suffix, options, ctx);
        }

        let candidates: Vec<String> = match packs {
            Some(packs) if !name.contains('.') => {
                packs.iter().map(|pack| format!("{pack}.{name}")).collect()
            }
            _ => vec![name.to_string()],
        };

        for candidate in candidates {
            ctx.load_attempts.push(candidate.clone());

            let outcome = match candidate.strip_prefix(LEGACY_PREFIX) {
                Some(short) => self.find_legacy(short, &suffix, options, ctx),
                None => {
                    let outcome = self.find_fq(&candidate, &suffix, options.ignore_deprecated, ctx);
                    if outcome.is_ok()
                        && ctx.resolved
                        && ctx.pending_redirect.is_none()
                        && !ctx.redirect_list.contains(&candidate)
                    {
                        ctx.redirect_list.push(candidate.clone());
                    }
                    outcome
                }
            };

            match outcome {
                Ok(()) if ctx.resolved || ctx.pending_redirect.is_some() => return Ok(()),
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(candidate = %candidate, error = %e, "plugin candidate failed");
                    ctx.errors.push(Arc::new(e));
                }
            }
        }

        ctx.exit_reason = Some(format!("no matches found for {name}"));
        Ok(())
    }

    fn lookup_suffix(&self, options: &FindOptions) -> String {
        match &options.mod_type {
            Some(suffix) => suffix.clone(),
            None if !self.kind.class_name.is_empty() => CLASS_SUFFIX.to_string(),
            None => String::new(),
        }
    }

    /// Look a fully qualified name up in its pack.
    fn find_fq(
        &self,
        fq_name: &str,
        extension: &str,
        ignore_deprecated: bool,
        ctx: &mut PluginLoadContext,
    ) -> Result<(), CorralError> {
        let plugin_type = self.kind.plugin_type;
        let plugin_ref = PluginRef::from_fqcr(fq_name, plugin_type)?;
        let metadata = self.finder.pack_metadata(&plugin_ref.pack)?;
        let ext = (!extension.is_empty()).then_some(extension);

        let mut action_plugin = None;
        if let Some(entry) = metadata.plugin_entry(plugin_type, &plugin_ref.resource, ext) {
            if let Some(tombstone) = &entry.tombstone {
                return Err(CorralError::removed(
                    fq_name,
                    tombstone.warning_text.as_deref(),
                    tombstone.removal_version.clone(),
                    tombstone.removal_date.clone(),
                ));
            }

            if let Some(deprecation) = &entry.deprecation
                && !ignore_deprecated
            {
                ctx.record_deprecation(fq_name, deprecation);
            }

            if let Some(target) = entry.redirect.as_deref().filter(|r| !r.is_empty()) {
                if !is_valid_fqcr(target) {
                    return Err(CorralError::InvalidRedirect {
                        name: fq_name.to_string(),
                        target: target.to_string(),
                    });
                }
                debug!(plugin_type = %plugin_type, from = %fq_name, to = %target, "following plugin redirect");
                if !ctx.redirect_list.iter().any(|n| n == fq_name) {
                    ctx.redirect_list.push(fq_name.to_string());
                }
                ctx.redirect(target);
                return Ok(());
            }

            if plugin_type == PluginType::Modules {
                action_plugin = entry.action_plugin.clone();
            }
        }

        let package = plugin_ref.package_name();
        let full_name = format!("{package}.{}", plugin_ref.resource);
        let pack = plugin_ref.pack.as_str();

        let node = match self.finder.import(&package) {
            Ok(node) => node,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(package = %package, error = %e, "plugin package not found");
                ctx.nope(format!("package {package} not found"));
                return Ok(());
            }
        };
        let Some(dir) = node.search_paths.first() else {
            ctx.nope(format!("{package} is not a package"));
            return Ok(());
        };

        let resource_file = format!("{}{extension}", plugin_ref.resource);
        let exact = dir.join(&resource_file);
        if exact.exists() {
            ctx.resolve(
                full_name,
                exact,
                pack,
                format!("found exact match for {fq_name} in {pack}"),
                action_plugin,
            );
            return Ok(());
        }

        if !extension.is_empty() {
            ctx.nope(format!("no match for {resource_file} in {pack}"));
            return Ok(());
        }

        let prefix = format!("{}.", plugin_ref.resource);
        let mut found: Vec<PathBuf> = list_files(dir)
            .map_err(|e| CorralError::Io {
                path: dir.clone(),
                source: e,
            })?
            .into_iter()
            .filter(|p| file_name(p).is_some_and(|n| n.starts_with(&prefix)) && !self.is_ignored(p))
            .collect();

        if found.is_empty() {
            ctx.nope(format!("failed fuzzy extension match for {fq_name} in {pack}"));
            return Ok(());
        }
        if found.len() > 1 {
            debug!(name = %fq_name, candidates = ?found, "multiple fuzzy matches, using the first");
        }
        let path = found.remove(0);
        ctx.resolve(
            full_name,
            path,
            pack,
            format!("found fuzzy extension match for {fq_name} in {pack}"),
            action_plugin,
        );
        Ok(())
    }

    /// Scan the flat search paths for a short name.
    fn find_legacy(
        &self,
        name: &str,
        suffix: &str,
        options: &FindOptions,
        ctx: &mut PluginLoadContext,
    ) -> Result<(), CorralError> {
        let ty = self.kind.plugin_type;
        ctx.resolved = false;

        let name = if options.check_aliases {
            self.kind.aliases.get(name).map(String::as_str).unwrap_or(name)
        } else {
            name
        };

        if let Some(entry) = self.caches.with(ty, |c| c.lookup(suffix, name))? {
            ctx.resolve_legacy(name, &entry);
            return Ok(());
        }

        let paths = self.search_paths_with_context()?;
        for entry in paths.iter() {
            let path = &entry.path;
            if self.caches.with(ty, |c| c.searched.contains(path))? || !path.is_dir() {
                continue;
            }

            debug!(path = %path.display(), "trying plugin directory");
            ctx.load_attempts.push(path.display().to_string());

            let files = match list_files(path) {
                Ok(files) => files,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "error accessing plugin path");
                    continue;
                }
            };

            let hit = self.caches.with(ty, |cache| {
                self.index_files(cache, &files, entry.internal);
                cache.searched.insert(path.clone());
                cache.lookup(suffix, name)
            })?;

            if let Some(hit) = hit {
                ctx.resolve_legacy(name, &hit);
                return Ok(());
            }
        }

        // Files named `_<name>` are deprecated spellings of `<name>`.
        if !name.starts_with('_') {
            let alias = format!("_{name}");
            if let Some(entry) = self.caches.with(ty, |c| c.lookup(suffix, &alias))? {
                let is_link = std::fs::symlink_metadata(&entry.path)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if !options.ignore_deprecated && !is_link {
                    let notice = RemovalNotice {
                        warning_text: Some(format!(
                            "It is kept for backwards compatibility under the name {alias}, but usage is discouraged."
                        )),
                        ..RemovalNotice::default()
                    };
                    ctx.record_deprecation(name, &notice);
                }
                ctx.resolve_legacy(&alias, &entry);
                return Ok(());
            }
        }

        let builtin = format!("{BUILTIN_PACK}.{name}");
        if !name.contains('.') && is_valid_fqcr(&builtin) {
            return self.find_fq(&builtin, suffix, options.ignore_deprecated, ctx);
        }

        ctx.nope(format!("{name} is not eligible for last-chance resolution"));
        Ok(())
    }

    /// Record every file of one directory under its base and full names, in
    /// both the any-extension bucket and its own extension's bucket.
    fn index_files(&self, cache: &mut TypeCache, files: &[PathBuf], internal: bool) {
        for file in files {
            let Some(full_name) = file_name(file) else {
                continue;
            };
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or(full_name);
            if stem == PACKAGE_INIT_STEM || self.is_ignored(file) {
                continue;
            }
            let extension = file
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();

            let entry = SearchPathEntry::new(file.clone(), internal);
            cache.insert_if_absent("", stem, &entry);
            cache.insert_if_absent("", full_name, &entry);
            cache.insert_if_absent(&extension, stem, &entry);
            cache.insert_if_absent(&extension, full_name, &entry);
        }
    }

    fn all_matches(&self, dedupe: bool, by_path: bool) -> Result<Vec<Candidate>, CorralError> {
        let ty = self.kind.plugin_type;
        let suffix = self.lookup_suffix(&FindOptions::default());
        let paths = self.search_paths_with_context()?;

        let mut matches = Vec::new();
        for entry in paths.iter() {
            let Ok(files) = list_files(&entry.path) else {
                continue;
            };
            for path in files {
                let Some(name) = file_name(&path) else {
                    continue;
                };
                if !name.ends_with(&suffix) || self.is_ignored(&path) {
                    continue;
                }
                let basename = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name)
                    .to_string();
                matches.push(Candidate {
                    path,
                    basename,
                    internal: entry.internal,
                });
            }
        }

        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for candidate in matches {
            if !by_path && self.filters.is_rejected(ty, &candidate.basename) {
                debug!(name = %candidate.basename, "skipped due to a defined plugin filter");
                continue;
            }
            if candidate.basename == PACKAGE_INIT_STEM
                || (candidate.basename == "base" && ty == PluginType::Cache)
            {
                debug!(path = %candidate.path.display(), "skipped due to reserved name");
                continue;
            }
            let key = if by_path {
                candidate.path.display().to_string()
            } else {
                candidate.fqcn()
            };
            if dedupe && !seen.insert(key) {
                debug!(path = %candidate.path.display(), "skipped as duplicate");
                continue;
            }
            kept.push(candidate);
        }
        Ok(kept)
    }

    fn load_matches(
        &self,
        matches: Vec<Candidate>,
        options: AllOptions,
    ) -> impl Iterator<Item = PluginHandle> + '_ {
        matches.into_iter().filter_map(move |candidate| {
            let fqcn = candidate.fqcn();

            if let Ok(Some(hit)) = self.cached_instance(&fqcn) {
                return hit.plugin;
            }

            match self.load_handle(
                &candidate.basename,
                &candidate.path,
                &fqcn,
                &[],
                options.class_only,
                &options.args,
            ) {
                Ok(handle) => {
                    let mut ctx = PluginLoadContext::new(self.kind.plugin_type);
                    let entry = SearchPathEntry::new(candidate.path.clone(), candidate.internal);
                    ctx.resolve_legacy(&candidate.basename, &entry);
                    if let Err(e) = self.remember_instance(&fqcn, &handle, &ctx) {
                        debug!(plugin = %fqcn, error = %e, "unable to cache plugin instance");
                    }
                    Some(handle)
                }
                Err(e) => {
                    warn!(path = %candidate.path.display(), error = %e, "skipping plugin");
                    None
                }
            }
        })
    }

    fn load_handle(
        &self,
        load_name: &str,
        path: &Path,
        fqcn: &str,
        redirect_list: &[String],
        class_only: bool,
        args: &Value,
    ) -> Result<PluginHandle, CorralError> {
        let module = self.load_module(load_name, path)?;
        let class = module.export(&self.kind.class_name).ok_or_else(|| CorralError::Load {
            path: path.to_path_buf(),
            message: format!("no export named `{}`", self.kind.class_name),
        })?;

        if let Some(capability) = self.kind.required_capability
            && !class.provides(capability)
        {
            return Err(CorralError::NonConforming {
                name: fqcn.to_string(),
                capability: capability.to_string(),
            });
        }

        let instance = if class_only {
            None
        } else {
            Some(class.instantiate(args)?)
        };

        debug!(plugin_type = %self.kind.plugin_type, plugin = %fqcn, path = %path.display(), "loaded plugin");
        Ok(PluginHandle::new(fqcn, load_name, path, redirect_list, class, instance))
    }

    fn load_module(&self, name: &str, path: &Path) -> Result<Arc<LoadedModule>, CorralError> {
        let ty = self.kind.plugin_type;
        if let Some(module) = self.caches.with(ty, |c| c.modules.get(path).cloned())? {
            return Ok(module);
        }
        let module = Arc::new(self.source.load(name, path)?);
        self.caches.with(ty, |c| {
            c.modules
                .entry(path.to_path_buf())
                .or_insert(module)
                .clone()
        })
    }

    fn cached_instance(&self, name: &str) -> Result<Option<LoadResult>, CorralError> {
        if !self.kind.cache_instances {
            return Ok(None);
        }
        Ok(self.instances()?.get(name).map(|(plugin, context)| LoadResult {
            plugin: Some(plugin.clone()),
            context: context.clone(),
        }))
    }

    fn remember_instance(
        &self,
        fqcn: &str,
        handle: &PluginHandle,
        context: &PluginLoadContext,
    ) -> Result<(), CorralError> {
        if self.kind.cache_instances && handle.class().is_stateless() && handle.instance().is_some() {
            self.instances()?
                .insert(fqcn.to_string(), (handle.clone(), context.clone()));
        }
        Ok(())
    }

    fn compute_paths(&self, subdirs: bool) -> Result<SearchPaths, CorralError> {
        let extra = self.extra_dirs()?.clone();
        Ok(build_search_paths(
            &SearchPathSources {
                extra_dirs: &extra,
                configured: &self.configured,
                builtin: self.builtin_dir.as_deref(),
                last_sorted_suffixes: &self.last_sorted_suffixes,
            },
            subdirs,
        ))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.ignore_extensions
            .iter()
            .any(|ext| !ext.is_empty() && text.ends_with(ext.as_str()))
    }

    fn extra_dirs(&self) -> Result<MutexGuard<'_, Vec<PathBuf>>, CorralError> {
        self.extra_dirs
            .lock()
            .map_err(|e| CorralError::Internal(format!("failed to lock loader directories: {e}")))
    }

    fn instances(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, (PluginHandle, PluginLoadContext)>>, CorralError> {
        self.instances
            .lock()
            .map_err(|e| CorralError::Internal(format!("failed to lock plugin instances: {e}")))
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("kind", &self.kind)
            .field("configured", &self.configured)
            .field("builtin_dir", &self.builtin_dir)
            .finish_non_exhaustive()
    }
}

/// Regular files directly inside `dir`, sorted by path.
fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ManifestSource;
    use corral_test_utils::{manifest, MockClass, PackTree};

    fn loader(kind: PluginKind, tree: &PackTree) -> PluginLoader {
        let finder = Arc::new(CollectionFinder::new([tree.path().join("none")]));
        let source = ManifestSource::new()
            .with_implementation("env", Arc::new(MockClass::new("LookupModule").with_capability(Capability::LookupBase)))
            .with_implementation("plain", Arc::new(MockClass::new("LookupModule")));
        PluginLoader::new(kind, finder, Arc::new(CacheRegistry::new()), Arc::new(source))
    }

    #[test]
    fn standard_kinds() {
        let connection = PluginKind::standard(PluginType::Connection);
        assert_eq!(connection.class_name, "Connection");
        assert_eq!(connection.legacy_subdir, "connection_plugins");
        assert_eq!(connection.aliases.get("paramiko").map(String::as_str), Some("paramiko_ssh"));
        assert_eq!(connection.required_capability, Some(Capability::ConnectionBase));

        let modules = PluginKind::standard(PluginType::Modules);
        assert!(modules.class_name.is_empty());
        assert_eq!(modules.legacy_subdir, "library");

        assert!(PluginKind::standard(PluginType::Vars).cache_instances);
        assert!(!PluginKind::standard(PluginType::Lookup).cache_instances);
    }

    #[test]
    fn class_loaders_default_to_manifest_suffix() {
        let tree = PackTree::new();
        let lookup = loader(PluginKind::standard(PluginType::Lookup), &tree);
        let modules = loader(PluginKind::standard(PluginType::Modules), &tree);
        assert_eq!(lookup.lookup_suffix(&FindOptions::default()), ".toml");
        assert_eq!(modules.lookup_suffix(&FindOptions::default()), "");
        let explicit = FindOptions {
            mod_type: Some(".sh".into()),
            ..FindOptions::default()
        };
        assert_eq!(modules.lookup_suffix(&explicit), ".sh");
    }

    #[test]
    fn index_covers_four_keys() {
        let tree = PackTree::new();
        let dir = tree.dir("lookups");
        tree.write("lookups/env.toml", &manifest(&[("LookupModule", "env")]));
        tree.write("lookups/__init__.toml", "");
        tree.write("lookups/notes.md", "");

        let lookup = loader(PluginKind::standard(PluginType::Lookup), &tree)
            .with_configured_paths(vec![dir.clone()]);
        assert!(lookup.find_plugin("env", &FindOptions::default()).unwrap().is_some());

        let keys = lookup
            .caches
            .with(PluginType::Lookup, |c| {
                let mut keys: Vec<(String, String)> = c
                    .plugin_paths
                    .iter()
                    .flat_map(|(b, names)| names.keys().map(move |n| (b.clone(), n.clone())))
                    .collect();
                keys.sort();
                keys
            })
            .unwrap();
        let expected: Vec<(String, String)> = [
            ("", "env"),
            ("", "env.toml"),
            (".toml", "env"),
            (".toml", "env.toml"),
        ]
        .iter()
        .map(|(b, n)| (b.to_string(), n.to_string()))
        .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn capability_mismatch_is_not_found_with_diagnostic() {
        let tree = PackTree::new();
        let dir = tree.dir("lookups");
        tree.write("lookups/plain.toml", &manifest(&[("LookupModule", "plain")]));

        let lookup = loader(PluginKind::standard(PluginType::Lookup), &tree)
            .with_configured_paths(vec![dir]);
        let result = lookup.get_with_context("plain", &GetOptions::default()).unwrap();
        assert!(result.plugin.is_none());
        assert!(result.context.resolved);
        assert!(matches!(
            result.context.errors.last().map(|e| e.as_ref()),
            Some(CorralError::NonConforming { .. })
        ));
    }

    #[test]
    fn missing_export_is_recorded() {
        let tree = PackTree::new();
        let dir = tree.dir("lookups");
        tree.write("lookups/odd.toml", &manifest(&[("SomethingElse", "env")]));

        let lookup = loader(PluginKind::standard(PluginType::Lookup), &tree)
            .with_configured_paths(vec![dir]);
        let result = lookup.get_with_context("odd", &GetOptions::default()).unwrap();
        assert!(result.plugin.is_none());
        assert!(matches!(
            result.context.errors.last().map(|e| e.as_ref()),
            Some(CorralError::Load { .. })
        ));
    }

    #[test]
    fn rejected_names_stop_resolution() {
        let tree = PackTree::new();
        let dir = tree.dir("library");
        tree.write("library/raw.sh", "");

        let modules = loader(PluginKind::standard(PluginType::Modules), &tree)
            .with_configured_paths(vec![dir])
            .with_filters(Arc::new(PluginFilters::with_rejected_modules(["raw"])));
        let ctx = modules.find_plugin_with_context("raw", &FindOptions::default()).unwrap();
        assert!(!ctx.resolved);
        assert!(ctx.exit_reason.unwrap().contains("plugin filter"));
    }
}
