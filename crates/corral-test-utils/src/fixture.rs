// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk fixtures for resolver and loader tests.
//!
//! `PackTree` owns a temporary directory; pack roots, packs and flat plugin
//! directories are created beneath it and removed when it drops.

use std::fs;
use std::path::{Path, PathBuf};

use corral_core::PluginType;
use tempfile::TempDir;

/// A temporary tree of pack roots and plugin directories.
pub struct PackTree {
    dir: TempDir,
}

impl PackTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Base of the temporary tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create (if needed) a pack root named `name`, with its `packs/` marker.
    pub fn root(&self, name: &str) -> PathBuf {
        let root = self.dir.path().join(name);
        fs::create_dir_all(root.join("packs")).expect("create pack root");
        root
    }

    /// Create pack `ns.pack` inside root `root`.
    pub fn pack(&self, root: &str, pack: &str) -> PackFixture {
        let (ns, name) = pack.split_once('.').expect("pack name must be ns.pack");
        let dir = self.root(root).join("packs").join(ns).join(name);
        fs::create_dir_all(&dir).expect("create pack dir");
        PackFixture { dir }
    }

    /// Create a flat directory relative to the tree.
    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(&path).expect("create dir");
        path
    }

    /// Write a file relative to the tree, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        write_file(&self.dir.path().join(rel), content)
    }
}

impl Default for PackTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the contents of one pack.
pub struct PackFixture {
    dir: PathBuf,
}

impl PackFixture {
    /// Add a plugin file under `plugins/<type>/`, e.g. `greet.toml`.
    pub fn with_plugin(self, plugin_type: PluginType, file: &str, content: &str) -> Self {
        write_file(
            &self.dir.join("plugins").join(plugin_type.as_str()).join(file),
            content,
        );
        self
    }

    /// Set the pack's `meta/runtime.toml`.
    pub fn with_runtime(self, toml: &str) -> Self {
        write_file(&self.dir.join("meta/runtime.toml"), toml);
        self
    }

    /// Add an arbitrary file relative to the pack root.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        write_file(&self.dir.join(rel), content);
        self
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Directory holding plugins of one type.
    pub fn plugin_dir(&self, plugin_type: PluginType) -> PathBuf {
        self.dir.join("plugins").join(plugin_type.as_str())
    }
}

/// Render a manifest exporting `(export name, implementation key)` pairs.
pub fn manifest(exports: &[(&str, &str)]) -> String {
    let mut table = toml::Table::new();
    let entries: Vec<toml::Value> = exports
        .iter()
        .map(|(name, implementation)| {
            let mut entry = toml::Table::new();
            entry.insert("name".into(), toml::Value::String((*name).into()));
            entry.insert(
                "implementation".into(),
                toml::Value::String((*implementation).into()),
            );
            toml::Value::Table(entry)
        })
        .collect();
    table.insert("exports".into(), toml::Value::Array(entries));
    toml::to_string(&table).expect("serialize manifest")
}

fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write fixture file");
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_layout() {
        let tree = PackTree::new();
        let pack = tree
            .pack("r1", "demo.tools")
            .with_plugin(PluginType::Modules, "greet.toml", "")
            .with_runtime("[plugin_routing]\n");

        assert!(tree.path().join("r1/packs/demo/tools").is_dir());
        assert!(pack.plugin_dir(PluginType::Modules).join("greet.toml").is_file());
        assert!(pack.path().join("meta/runtime.toml").is_file());
    }

    #[test]
    fn manifest_lists_exports() {
        let text = manifest(&[("LookupModule", "echo")]);
        let parsed: toml::Table = toml::from_str(&text).unwrap();
        let exports = parsed["exports"].as_array().unwrap();
        assert_eq!(exports[0]["name"].as_str(), Some("LookupModule"));
        assert_eq!(exports[0]["implementation"].as_str(), Some("echo"));
    }
}
