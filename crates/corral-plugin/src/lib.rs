// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin resolution and loading for Corral.
//!
//! Given a plugin type and a requested name, the loaders in this crate find
//! the file that implements it, either inside a content pack (fully qualified
//! names, routed through pack metadata) or in flat search directories (short
//! names), then load, validate and instantiate it.
//!
//! # Components
//!
//! - [`PluginLoader`]: resolution, loading and enumeration for one plugin type
//! - [`TemplatePluginLoader`]: per-function resolution for filters and tests
//! - [`PluginLoaders`]: every loader, built from [`corral_config::CorralConfig`]
//! - [`PluginLoadContext`]: the record of one resolution
//! - [`PluginFilters`]: operator reject-lists
//! - [`VersionGate`]: pack runtime requirement checks
//! - [`ModuleSource`]: how a resolved file becomes loadable exports

pub mod cache;
pub mod context;
pub mod filter;
pub mod handle;
pub mod loader;
pub mod loaders;
pub mod search_path;
pub mod source;
pub mod template;
pub mod version;

pub use cache::{CacheRegistry, TypeCache};
pub use context::PluginLoadContext;
pub use filter::{PluginFilters, DEFAULT_FILTER_FILE};
pub use handle::PluginHandle;
pub use loader::{
    AllOptions, FindOptions, GetOptions, LoadResult, PluginKind, PluginLoader, CLASS_SUFFIX,
};
pub use loaders::PluginLoaders;
pub use search_path::{build_search_paths, SearchPathEntry, SearchPathSources, SearchPaths};
pub use source::{LoadedModule, ManifestSource, ModuleSource};
pub use template::{TemplateLoadResult, TemplatePlugin, TemplatePluginLoader};
pub use version::VersionGate;
