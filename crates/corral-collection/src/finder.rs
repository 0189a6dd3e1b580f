// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The layered content-pack resolver.
//!
//! Virtual package names are resolved by dotted depth:
//!
//! | depth | name                  | behaviour                                  |
//! |-------|-----------------------|--------------------------------------------|
//! | 1     | `packs`               | union of every root containing `packs/`    |
//! | 2     | `packs.<ns>`          | union across roots; `corral` always exists |
//! | 3     | `packs.<ns>.<pack>`   | first root wins, metadata loaded, hooks run |
//! | 4+    | anything below a pack | redirects, then a single on-disk lookup    |
//!
//! Resolved nodes are memoized until [`CollectionFinder::invalidate`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use corral_config::{expand_path, CorralConfig};
use corral_core::{
    is_valid_pack_name, CorralError, BUILTIN_PACK, RESERVED_NAMESPACE, ROOT_PACKAGE,
};
use tracing::{debug, warn};

use crate::events::{PackLoadHooks, PackLoadListener, PackLoaded};
use crate::node::{ModuleNode, NodeKind, PackHandle};
use crate::redirect::{ancestor_redirect, RedirectTable};
use crate::routing::PackMetadata;

/// Marker file that gives a package directory executable content.
pub const PACKAGE_INIT: &str = "__init__.toml";

/// Extension of module files in the virtual package tree.
pub const MODULE_EXT: &str = "toml";

/// Directory project-local packs live under, relative to a project dir.
pub const PROJECT_PACK_DIR: &str = "content";

/// A child entry reported by [`CollectionFinder::iter_modules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub is_package: bool,
}

#[derive(Debug, Default)]
struct FinderState {
    modules: HashMap<String, Arc<ModuleNode>>,
    redirects: RedirectTable,
    project_paths: Vec<PathBuf>,
    cached_roots: Option<Vec<PathBuf>>,
}

/// Resolves virtual package names to on-disk content packs.
#[derive(Debug)]
pub struct CollectionFinder {
    configured_roots: Vec<PathBuf>,
    builtin_plugins: Option<PathBuf>,
    builtin_runtime: Option<PathBuf>,
    hooks: PackLoadHooks,
    state: Mutex<FinderState>,
}

impl CollectionFinder {
    /// Create a finder over the given pack roots, highest priority first.
    ///
    /// Roots without a `packs/` directory are dropped; a root given as the
    /// `packs` directory itself is accepted and normalized to its parent.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut good: Vec<PathBuf> = Vec::new();
        for root in roots {
            let mut root: PathBuf = root.into();
            if root.file_name().is_some_and(|n| n == ROOT_PACKAGE) {
                if let Some(parent) = root.parent() {
                    root = parent.to_path_buf();
                }
            }
            if !good.contains(&root) && root.join(ROOT_PACKAGE).is_dir() {
                good.push(root);
            } else {
                debug!(root = %root.display(), "skipping pack root without packs/ directory");
            }
        }

        Self {
            configured_roots: good,
            builtin_plugins: None,
            builtin_runtime: None,
            hooks: PackLoadHooks::new(),
            state: Mutex::new(FinderState::default()),
        }
    }

    /// Build a finder from configuration: pack roots plus the built-in pack.
    pub fn from_config(config: &CorralConfig) -> Self {
        Self::new(config.packs.paths.iter().map(|p| expand_path(p))).with_builtin(
            expand_path(&config.loader.builtin_dir),
            expand_path(&config.loader.builtin_runtime_path()),
        )
    }

    /// Map the built-in pack's `plugins` package onto a directory, and read its
    /// routing metadata from `runtime`.
    pub fn with_builtin(mut self, plugins_dir: impl Into<PathBuf>, runtime: impl Into<PathBuf>) -> Self {
        self.builtin_plugins = Some(plugins_dir.into());
        self.builtin_runtime = Some(runtime.into());
        self
    }

    /// Register a pack-loaded listener.
    pub fn subscribe(&self, listener: Arc<dyn PackLoadListener>) {
        self.hooks.subscribe(listener);
    }

    /// Configured roots that passed the `packs/` check.
    pub fn configured_roots(&self) -> &[PathBuf] {
        &self.configured_roots
    }

    /// Effective roots in priority order: project paths, then configured roots.
    pub fn pack_roots(&self) -> Result<Vec<PathBuf>, CorralError> {
        let mut state = self.state()?;
        if let Some(roots) = &state.cached_roots {
            return Ok(roots.clone());
        }
        let mut roots = state.project_paths.clone();
        roots.extend(self.configured_roots.iter().cloned());
        state.cached_roots = Some(roots.clone());
        Ok(roots)
    }

    /// Add project-local roots (`<dir>/content`) ahead of the configured roots.
    ///
    /// Already-resolved root and namespace nodes are refreshed; packs that were
    /// already located keep their location.
    pub fn set_project_paths<I, P>(&self, dirs: I) -> Result<(), CorralError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref().to_path_buf();
            if !seen.contains(&dir) {
                seen.push(dir);
            }
        }

        let mut state = self.state()?;
        state.project_paths = seen.into_iter().map(|d| d.join(PROJECT_PACK_DIR)).collect();
        state.cached_roots = None;
        state
            .modules
            .retain(|_, node| !matches!(node.kind, NodeKind::Root | NodeKind::Namespace));
        Ok(())
    }

    /// Forget every resolved node, pack and subtree redirect.
    pub fn invalidate(&self) -> Result<(), CorralError> {
        let mut state = self.state()?;
        state.modules.clear();
        state.redirects.clear();
        state.cached_roots = None;
        debug!("collection finder invalidated");
        Ok(())
    }

    /// Resolve a virtual package name to its node.
    pub fn import(&self, fullname: &str) -> Result<Arc<ModuleNode>, CorralError> {
        let mut chain = Vec::new();
        self.import_chain(fullname, &mut chain)
    }

    /// Whether a name is already registered (directly or as an alias).
    pub fn is_loaded(&self, fullname: &str) -> bool {
        self.state()
            .map(|s| s.modules.contains_key(fullname))
            .unwrap_or(false)
    }

    /// The handle for a pack, loading it if needed.
    pub fn pack(&self, pack: &str) -> Result<Arc<PackHandle>, CorralError> {
        if !is_valid_pack_name(pack) {
            return Err(CorralError::InvalidReference {
                reference: pack.to_string(),
                reason: "pack names take the form ns.pack".to_string(),
            });
        }
        let node = self.import(&format!("{ROOT_PACKAGE}.{pack}"))?;
        node.pack
            .clone()
            .ok_or_else(|| CorralError::Internal(format!("{pack} resolved to a non-pack node")))
    }

    /// Routing metadata for a pack.
    pub fn pack_metadata(&self, pack: &str) -> Result<Arc<PackMetadata>, CorralError> {
        Ok(self.pack(pack)?.metadata.clone())
    }

    /// Directory of the winning copy of a pack (`None` for the built-in pack).
    pub fn pack_path(&self, pack: &str) -> Result<Option<PathBuf>, CorralError> {
        Ok(self.pack(pack)?.root.clone())
    }

    /// The pack a path belongs to, if that pack is the one resolution would use.
    ///
    /// A path inside a pack that is shadowed by a higher-priority root yields `None`.
    pub fn pack_name_from_path(&self, path: &Path) -> Option<String> {
        let path = std::path::absolute(path).ok()?;
        let parts: Vec<Component<'_>> = path.components().collect();

        let positions: Vec<usize> = parts
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_os_str() == ROOT_PACKAGE)
            .map(|(i, _)| i)
            .collect();
        let [pos] = positions.as_slice() else {
            return None;
        };
        if parts.len() < pos + 3 {
            return None;
        }

        let ns = parts[pos + 1].as_os_str().to_str()?;
        let name = parts[pos + 2].as_os_str().to_str()?;
        let candidate = format!("{ns}.{name}");

        let root = self.pack_path(&candidate).ok()??;
        let root = std::path::absolute(root).ok()?;
        let prefix: PathBuf = parts[..pos + 3].iter().collect();

        (prefix == root).then_some(candidate)
    }

    /// List the children of a package across all of its search paths.
    ///
    /// Directories containing a `.` are not packages and are skipped; only
    /// `*.toml` files other than `__init__.toml` count as modules.
    pub fn iter_modules(&self, package: &str) -> Result<Vec<ModuleInfo>, CorralError> {
        let node = self.import(package)?;
        let mut found = Vec::new();

        for dir in &node.search_paths {
            if !dir.is_dir() {
                continue;
            }
            let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
                Ok(rd) => rd.filter_map(Result::ok).map(|e| e.path()).collect(),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "unable to list package directory");
                    continue;
                }
            };
            entries.sort();

            for entry in entries {
                let Some(file_name) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if entry.is_dir() {
                    if file_name.contains('.') {
                        continue;
                    }
                    found.push(ModuleInfo {
                        name: file_name.to_string(),
                        is_package: true,
                    });
                } else if file_name != PACKAGE_INIT
                    && let Some(stem) = file_name.strip_suffix(&format!(".{MODULE_EXT}"))
                {
                    found.push(ModuleInfo {
                        name: stem.to_string(),
                        is_package: false,
                    });
                }
            }
        }

        Ok(found)
    }

    fn state(&self) -> Result<MutexGuard<'_, FinderState>, CorralError> {
        self.state
            .lock()
            .map_err(|e| CorralError::Internal(format!("failed to lock finder state: {e}")))
    }

    fn cached(&self, fullname: &str) -> Result<Option<Arc<ModuleNode>>, CorralError> {
        Ok(self.state()?.modules.get(fullname).cloned())
    }

    fn register(&self, fullname: &str, node: Arc<ModuleNode>) -> Result<Arc<ModuleNode>, CorralError> {
        let mut state = self.state()?;
        Ok(state
            .modules
            .entry(fullname.to_string())
            .or_insert(node)
            .clone())
    }

    fn import_chain(
        &self,
        fullname: &str,
        chain: &mut Vec<String>,
    ) -> Result<Arc<ModuleNode>, CorralError> {
        if let Some(node) = self.cached(fullname)? {
            return Ok(node);
        }
        if chain.iter().any(|n| n == fullname) {
            chain.push(fullname.to_string());
            return Err(CorralError::CircularRedirect {
                name: chain[0].clone(),
                chain: chain.clone(),
            });
        }
        chain.push(fullname.to_string());

        let parts: Vec<&str> = fullname.split('.').collect();
        if parts.first() != Some(&ROOT_PACKAGE) || parts.iter().any(|p| p.is_empty()) {
            return Err(CorralError::ModuleNotFound(fullname.to_string()));
        }

        let node = match parts.len() {
            1 => self.load_root()?,
            2 => {
                let parent = self.import_chain(ROOT_PACKAGE, chain)?;
                self.load_namespace(fullname, parts[1], &parent)?
            }
            3 => {
                let parent = self.import_chain(&parts[..2].join("."), chain)?;
                // Pack nodes register themselves before hooks run.
                return self.load_pack(fullname, &parts[1..3].join("."), parts[2], &parent);
            }
            _ => {
                let (parent_name, leaf) = fullname
                    .rsplit_once('.')
                    .ok_or_else(|| CorralError::ModuleNotFound(fullname.to_string()))?;
                let parent = self.import_chain(parent_name, chain)?;
                let pack = parts[1..3].join(".");
                return self.load_interior(fullname, leaf, &pack, &parent, chain);
            }
        };

        self.register(fullname, Arc::new(node))
    }

    fn load_root(&self) -> Result<ModuleNode, CorralError> {
        let search_paths: Vec<PathBuf> = self
            .pack_roots()?
            .into_iter()
            .map(|root| root.join(ROOT_PACKAGE))
            .filter(|p| p.is_dir())
            .collect();

        Ok(ModuleNode {
            name: ROOT_PACKAGE.to_string(),
            kind: NodeKind::Root,
            search_paths,
            source_path: None,
            has_code: false,
            pack: None,
        })
    }

    fn load_namespace(
        &self,
        fullname: &str,
        namespace: &str,
        parent: &ModuleNode,
    ) -> Result<ModuleNode, CorralError> {
        let search_paths: Vec<PathBuf> = parent
            .search_paths
            .iter()
            .map(|p| p.join(namespace))
            .filter(|p| p.is_dir())
            .collect();

        if search_paths.is_empty() && namespace != RESERVED_NAMESPACE {
            return Err(CorralError::ModuleNotFound(fullname.to_string()));
        }

        Ok(ModuleNode {
            name: fullname.to_string(),
            kind: NodeKind::Namespace,
            search_paths,
            source_path: None,
            has_code: false,
            pack: None,
        })
    }

    fn load_pack(
        &self,
        fullname: &str,
        pack_name: &str,
        leaf: &str,
        parent: &ModuleNode,
    ) -> Result<Arc<ModuleNode>, CorralError> {
        let (root, metadata) = if pack_name == BUILTIN_PACK {
            (None, self.builtin_metadata()?)
        } else {
            let root = parent
                .search_paths
                .iter()
                .map(|p| p.join(leaf))
                .find(|p| p.is_dir())
                .ok_or_else(|| CorralError::PackNotFound(pack_name.to_string()))?;
            let metadata = PackMetadata::load_from_pack_dir(pack_name, &root)?;
            (Some(root), metadata)
        };

        let handle = Arc::new(PackHandle::new(pack_name, root.clone(), metadata));
        let node = self.register(
            fullname,
            Arc::new(ModuleNode {
                name: fullname.to_string(),
                kind: NodeKind::Pack,
                search_paths: root.iter().cloned().collect(),
                source_path: None,
                has_code: false,
                pack: Some(handle.clone()),
            }),
        )?;

        let event = PackLoaded {
            name: pack_name,
            root: root.as_deref(),
            metadata: &handle.metadata,
        };
        if let Err(e) = self.hooks.fire(&event) {
            self.state()?.modules.remove(fullname);
            return Err(e);
        }
        handle.mark_notified();

        debug!(pack = %pack_name, root = ?root, "loaded content pack");
        Ok(node)
    }

    fn builtin_metadata(&self) -> Result<PackMetadata, CorralError> {
        match &self.builtin_runtime {
            Some(path) if path.is_file() => PackMetadata::load_file(BUILTIN_PACK, path),
            Some(path) => {
                debug!(path = %path.display(), "no built-in routing metadata");
                Ok(PackMetadata::default())
            }
            None => Ok(PackMetadata::default()),
        }
    }

    fn load_interior(
        &self,
        fullname: &str,
        leaf: &str,
        pack: &str,
        parent: &ModuleNode,
        chain: &mut Vec<String>,
    ) -> Result<Arc<ModuleNode>, CorralError> {
        let metadata = self.pack_metadata(pack)?;

        let explicit = metadata.import_redirect(fullname).map(str::to_string);
        let redirect = match &explicit {
            Some(target) => Some(target.clone()),
            None => ancestor_redirect(fullname, &self.state()?.redirects),
        };

        if let Some(target) = redirect {
            debug!(from = %fullname, to = %target, explicit = explicit.is_some(), "redirecting package");
            let node = self.import_chain(&target, chain)?;
            let mut state = self.state()?;
            if explicit.is_some() && node.is_package() {
                state.redirects.insert(fullname, target);
            }
            state.modules.insert(fullname.to_string(), node.clone());
            return Ok(node);
        }

        let base = if pack == BUILTIN_PACK && parent.kind == NodeKind::Pack {
            // The built-in pack has no root; only its `plugins` package exists.
            match (&self.builtin_plugins, leaf) {
                (Some(dir), "plugins") if dir.is_dir() => {
                    return self.register(
                        fullname,
                        Arc::new(ModuleNode {
                            name: fullname.to_string(),
                            kind: NodeKind::Package,
                            search_paths: vec![dir.clone()],
                            source_path: None,
                            has_code: false,
                            pack: None,
                        }),
                    );
                }
                _ => return Err(CorralError::ModuleNotFound(fullname.to_string())),
            }
        } else {
            parent
                .search_paths
                .first()
                .cloned()
                .ok_or_else(|| CorralError::ModuleNotFound(format!("{fullname} (package has no paths)")))?
        };

        let node = module_from_path(fullname, leaf, &base)?;
        self.register(fullname, Arc::new(node))
    }
}

/// Locate `leaf` inside `dir` as either a package directory or a module file.
fn module_from_path(fullname: &str, leaf: &str, dir: &Path) -> Result<ModuleNode, CorralError> {
    let package_path = dir.join(leaf);
    if package_path.is_dir() {
        let init = package_path.join(PACKAGE_INIT);
        let has_code = init.is_file();
        return Ok(ModuleNode {
            name: fullname.to_string(),
            kind: NodeKind::Package,
            search_paths: vec![package_path],
            source_path: has_code.then_some(init),
            has_code,
            pack: None,
        });
    }

    let module_path = dir.join(format!("{leaf}.{MODULE_EXT}"));
    if module_path.is_file() {
        return Ok(ModuleNode {
            name: fullname.to_string(),
            kind: NodeKind::Module,
            search_paths: Vec::new(),
            source_path: Some(module_path),
            has_code: true,
            pack: None,
        });
    }

    Err(CorralError::ModuleNotFound(format!(
        "{fullname} (not found at {})",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mkdirs(root: &Path, rel: &str) -> PathBuf {
        let p = root.join(rel);
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn roots_without_marker_are_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good");
        mkdirs(&good, "packs");
        let bad = mkdirs(tmp.path(), "bad");

        let finder = CollectionFinder::new([good.clone(), bad, good.join("packs")]);
        assert_eq!(finder.configured_roots(), &[good]);
    }

    #[test]
    fn reserved_namespace_exists_without_disk_content() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "packs");
        let finder = CollectionFinder::new([tmp.path()]);

        let node = finder.import("packs.corral").unwrap();
        assert_eq!(node.kind, NodeKind::Namespace);
        assert!(node.search_paths.is_empty());

        let err = finder.import("packs.nobody").unwrap_err();
        assert!(matches!(err, CorralError::ModuleNotFound(_)));
    }

    #[test]
    fn builtin_pack_has_no_search_paths() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "packs/corral/builtin");
        let plugins = mkdirs(tmp.path(), "builtin");
        let finder = CollectionFinder::new([tmp.path()])
            .with_builtin(&plugins, tmp.path().join("missing-runtime.toml"));

        let pack = finder.import("packs.corral.builtin").unwrap();
        assert!(pack.search_paths.is_empty());
        assert!(pack.pack.as_ref().unwrap().root.is_none());

        let plugins_node = finder.import("packs.corral.builtin.plugins").unwrap();
        assert_eq!(plugins_node.search_paths, vec![plugins]);
    }

    #[test]
    fn package_without_init_is_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let pack = mkdirs(tmp.path(), "packs/demo/tools");
        mkdirs(&pack, "plugins/modules");
        fs::write(pack.join("plugins/modules/greet.toml"), "").unwrap();
        mkdirs(&pack, "plugins/module_utils/helpers");
        fs::write(pack.join("plugins/module_utils/helpers/__init__.toml"), "").unwrap();

        let finder = CollectionFinder::new([tmp.path()]);
        let plugins = finder.import("packs.demo.tools.plugins").unwrap();
        assert!(!plugins.has_code);

        let helpers = finder.import("packs.demo.tools.plugins.module_utils.helpers").unwrap();
        assert!(helpers.has_code);

        let greet = finder.import("packs.demo.tools.plugins.modules.greet").unwrap();
        assert_eq!(greet.kind, NodeKind::Module);
        assert_eq!(greet.dir(), Some(pack.join("plugins/modules").as_path()));
    }

    #[test]
    fn names_outside_root_package_are_not_found() {
        let finder = CollectionFinder::new(Vec::<PathBuf>::new());
        assert!(matches!(
            finder.import("other.pkg"),
            Err(CorralError::ModuleNotFound(_))
        ));
        assert!(matches!(finder.import("packs..x"), Err(CorralError::ModuleNotFound(_))));
    }
}
