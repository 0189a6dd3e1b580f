// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved nodes of the virtual package tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::routing::PackMetadata;

/// Which tier produced a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `packs`, merged across every root.
    Root,
    /// `packs.<ns>`, merged across every root.
    Namespace,
    /// `packs.<ns>.<pack>`, first root only.
    Pack,
    /// A directory beneath a pack.
    Package,
    /// A single file beneath a pack.
    Module,
}

/// One content pack, located once and kept until the finder is invalidated.
#[derive(Debug)]
pub struct PackHandle {
    /// `ns.pack`
    pub name: String,
    /// Directory of the winning pack; `None` for the built-in pack.
    pub root: Option<PathBuf>,
    pub metadata: Arc<PackMetadata>,
    notified: AtomicBool,
}

impl PackHandle {
    pub fn new(name: impl Into<String>, root: Option<PathBuf>, metadata: PackMetadata) -> Self {
        Self {
            name: name.into(),
            root,
            metadata: Arc::new(metadata),
            notified: AtomicBool::new(false),
        }
    }

    /// Whether pack-loaded listeners already ran for this handle.
    pub fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    pub(crate) fn mark_notified(&self) {
        self.notified.store(true, Ordering::Release);
    }
}

/// A node registered in the finder's module table.
///
/// Redirected names are registered pointing at the target's node, so the
/// node's `name` is always the real location, never an alias.
#[derive(Debug)]
pub struct ModuleNode {
    pub name: String,
    pub kind: NodeKind,
    /// Directories searched for children. Empty for modules and for the built-in pack.
    pub search_paths: Vec<PathBuf>,
    /// `__init__.toml` for packages with code, the file itself for modules.
    pub source_path: Option<PathBuf>,
    /// `false` for placeholder namespace-only directories.
    pub has_code: bool,
    /// Set on pack nodes.
    pub pack: Option<Arc<PackHandle>>,
}

impl ModuleNode {
    pub fn is_package(&self) -> bool {
        !matches!(self.kind, NodeKind::Module)
    }

    /// Directory the node's own files live in.
    pub fn dir(&self) -> Option<&Path> {
        match self.kind {
            NodeKind::Module => self.source_path.as_deref().and_then(Path::parent),
            _ => self.search_paths.first().map(PathBuf::as_path),
        }
    }
}
