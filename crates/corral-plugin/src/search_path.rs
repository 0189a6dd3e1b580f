// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered plugin search paths for flat (non-pack) lookup.
//!
//! Order: directories added at runtime, then configured directories (each
//! preceded by its sub-category directories one and two levels down), then
//! the built-in directory and its nested package directories. Entries ending
//! in a sort-last suffix are moved to the end, keeping their relative order.

use std::path::{Path, PathBuf};

use corral_collection::PACKAGE_INIT;
use tracing::debug;
use walkdir::WalkDir;

/// One directory to scan, and whether it ships with Corral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchPathEntry {
    pub path: PathBuf,
    pub internal: bool,
}

impl SearchPathEntry {
    pub fn new(path: impl Into<PathBuf>, internal: bool) -> Self {
        Self {
            path: path.into(),
            internal,
        }
    }
}

/// Inputs to [`build_search_paths`].
#[derive(Debug, Clone, Copy)]
pub struct SearchPathSources<'a> {
    pub extra_dirs: &'a [PathBuf],
    pub configured: &'a [PathBuf],
    pub builtin: Option<&'a Path>,
    pub last_sorted_suffixes: &'a [String],
}

/// The computed, ordered search path list for one loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    entries: Vec<SearchPathEntry>,
}

impl SearchPaths {
    pub fn entries(&self) -> &[SearchPathEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchPathEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    /// Just the directories, in search order.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Directories joined with `:`, first occurrence kept.
    pub fn format(&self) -> String {
        let mut seen: Vec<&Path> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.path.as_path()) {
                seen.push(&entry.path);
            }
        }
        seen.iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    fn push(&mut self, path: PathBuf, internal: bool) {
        if !self.contains(&path) {
            self.entries.push(SearchPathEntry { path, internal });
        }
    }
}

/// Assemble the search paths for one loader.
///
/// With `subdirs` false, configured directories are not expanded and only the
/// top built-in directory is included.
pub fn build_search_paths(sources: &SearchPathSources<'_>, subdirs: bool) -> SearchPaths {
    let mut paths = SearchPaths::default();

    for dir in sources.extra_dirs {
        paths.push(dir.clone(), false);
    }

    for dir in sources.configured {
        if subdirs {
            for nested in category_dirs(dir) {
                paths.push(nested, false);
            }
        }
        paths.push(dir.clone(), false);
    }

    if let Some(builtin) = sources.builtin {
        if subdirs {
            for dir in package_dirs(builtin) {
                paths.push(dir, true);
            }
        } else {
            paths.push(builtin.to_path_buf(), true);
        }
    }

    let suffixes = sources.last_sorted_suffixes;
    // sort_by_key is stable, so both groups keep their order.
    paths
        .entries
        .sort_by_key(|e| sorts_last(&e.path, suffixes));

    debug!(count = paths.len(), "computed plugin search paths");
    paths
}

fn sorts_last(path: &Path, suffixes: &[String]) -> bool {
    let text = path.to_string_lossy();
    suffixes.iter().any(|s| !s.is_empty() && text.ends_with(s.as_str()))
}

/// Directories one level below `dir`, then two levels below, each group sorted.
fn category_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut first = Vec::new();
    let mut second = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name();

    let visible =
        |e: &walkdir::DirEntry| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.');
    for entry in walker.into_iter().filter_entry(visible).filter_map(Result::ok) {
        if !entry.file_type().is_dir() {
            continue;
        }
        match entry.depth() {
            1 => first.push(entry.into_path()),
            _ => second.push(entry.into_path()),
        }
    }

    first.extend(second);
    first
}

/// `dir` itself plus every subdirectory of a directory holding a package marker.
fn package_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut found = vec![dir.to_path_buf()];
    if !dir.is_dir() {
        return found;
    }

    let walker = WalkDir::new(dir).follow_links(true).sort_by_file_name();
    for entry in walker.into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_dir() || !entry.path().join(PACKAGE_INIT).is_file() {
            continue;
        }
        let Ok(children) = std::fs::read_dir(entry.path()) else {
            continue;
        };
        let mut children: Vec<PathBuf> = children
            .filter_map(Result::ok)
            .map(|c| c.path())
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        found.extend(children);
    }
    found
}
