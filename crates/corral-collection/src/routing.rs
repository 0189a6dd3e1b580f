// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-pack routing metadata (`meta/runtime.toml` or `meta/runtime.json`).
//!
//! The metadata maps `(plugin type, resource)` to redirect, deprecation and
//! tombstone entries, and full package names to import redirects. Unknown keys
//! are tolerated so packs can carry metadata for other tools.

use std::collections::BTreeMap;
use std::path::Path;

use corral_core::{CorralError, PluginType};
use serde::{Deserialize, Deserializer, Serialize};

/// Relative locations checked, in order, for a pack's routing metadata.
pub const RUNTIME_FILES: &[&str] = &["meta/runtime.toml", "meta/runtime.json"];

/// Decoded routing metadata for one content pack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackMetadata {
    /// Semver requirement on the running Corral version.
    #[serde(default)]
    pub requires_corral: Option<String>,

    /// `plugin type -> resource -> entry`.
    #[serde(default)]
    pub plugin_routing: BTreeMap<String, BTreeMap<String, RoutingEntry>>,

    /// Full virtual package name -> redirect.
    #[serde(default)]
    pub import_redirection: BTreeMap<String, ImportRedirect>,
}

/// Routing instructions for a single resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    /// Fully qualified replacement reference.
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub deprecation: Option<RemovalNotice>,
    #[serde(default)]
    pub tombstone: Option<RemovalNotice>,
    /// Companion action plugin for a module.
    #[serde(default)]
    pub action_plugin: Option<String>,
}

/// Deprecation or removal details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovalNotice {
    #[serde(default)]
    pub warning_text: Option<String>,
    #[serde(default)]
    pub removal_date: Option<String>,
    /// Versions are often written as bare numbers (`3.0`); both forms are kept as text.
    #[serde(default, deserialize_with = "version_text")]
    pub removal_version: Option<String>,
}

/// A package-level redirect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRedirect {
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionText {
    Text(String),
    Int(i64),
    Float(f64),
}

fn version_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<VersionText> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        VersionText::Text(s) => s,
        VersionText::Int(i) => i.to_string(),
        // Debug keeps the fractional part: 3.0 stays "3.0".
        VersionText::Float(f) => format!("{f:?}"),
    }))
}

impl PackMetadata {
    /// Routing entry for a resource, preferring the extension-qualified key.
    ///
    /// `greet.toml` is consulted before `greet` when `extension` is `.toml`.
    pub fn plugin_entry(
        &self,
        plugin_type: PluginType,
        resource: &str,
        extension: Option<&str>,
    ) -> Option<&RoutingEntry> {
        let entries = self.plugin_routing.get(plugin_type.as_str())?;
        if let Some(ext) = extension.filter(|e| !e.is_empty()) {
            if let Some(entry) = entries.get(&format!("{resource}{ext}")) {
                return Some(entry);
            }
        }
        entries.get(resource)
    }

    /// Explicit package redirect for a full virtual package name.
    pub fn import_redirect(&self, fullname: &str) -> Option<&str> {
        self.import_redirection
            .get(fullname)
            .and_then(|r| r.redirect.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// Decode TOML metadata.
    pub fn from_toml_str(pack: &str, content: &str) -> Result<Self, CorralError> {
        toml::from_str(content).map_err(|e| CorralError::Metadata {
            pack: pack.to_string(),
            message: e.to_string(),
        })
    }

    /// Decode JSON metadata.
    pub fn from_json_str(pack: &str, content: &str) -> Result<Self, CorralError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|e| CorralError::Metadata {
            pack: pack.to_string(),
            message: e.to_string(),
        })
    }

    /// Read a metadata file, choosing the decoder by extension.
    pub fn load_file(pack: &str, path: &Path) -> Result<Self, CorralError> {
        let content = std::fs::read_to_string(path).map_err(|source| CorralError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(pack, &content),
            _ => Self::from_toml_str(pack, &content),
        }
    }

    /// Read the routing metadata under a pack root. A pack without any
    /// metadata file routes nothing.
    pub fn load_from_pack_dir(pack: &str, root: &Path) -> Result<Self, CorralError> {
        for rel in RUNTIME_FILES {
            let path = root.join(rel);
            if path.is_file() {
                return Self::load_file(pack, &path);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNTIME: &str = r#"
requires_corral = ">=0.1"

[plugin_routing.modules.old_greet]
redirect = "demo.tools.greet"

[plugin_routing.modules.legacy_tool.tombstone]
removal_version = "3.0"
warning_text = "Use demo.tools.greet."

[plugin_routing.modules."shout.toml"]
redirect = "demo.tools.yell"

[plugin_routing.modules.shout.deprecation]
removal_version = 2.5

[plugin_routing.modules.ping]
action_plugin = "demo.tools.ping_action"

[import_redirection."packs.demo.tools.plugins.module_utils.old"]
redirect = "packs.demo.tools.plugins.module_utils.new"

[galaxy]
ignored = true
"#;

    #[test]
    fn decodes_toml_runtime() {
        let meta = PackMetadata::from_toml_str("demo.tools", RUNTIME).unwrap();
        assert_eq!(meta.requires_corral.as_deref(), Some(">=0.1"));

        let entry = meta.plugin_entry(PluginType::Modules, "old_greet", None).unwrap();
        assert_eq!(entry.redirect.as_deref(), Some("demo.tools.greet"));

        let tomb = meta
            .plugin_entry(PluginType::Modules, "legacy_tool", None)
            .and_then(|e| e.tombstone.as_ref())
            .unwrap();
        assert_eq!(tomb.removal_version.as_deref(), Some("3.0"));
    }

    #[test]
    fn numeric_versions_keep_their_text() {
        let meta = PackMetadata::from_toml_str("demo.tools", RUNTIME).unwrap();
        let dep = meta.plugin_routing["modules"]["shout"].deprecation.as_ref().unwrap();
        assert_eq!(dep.removal_version.as_deref(), Some("2.5"));
    }

    #[test]
    fn extension_key_wins_over_bare_key() {
        let meta = PackMetadata::from_toml_str("demo.tools", RUNTIME).unwrap();
        let with_ext = meta.plugin_entry(PluginType::Modules, "shout", Some(".toml")).unwrap();
        assert_eq!(with_ext.redirect.as_deref(), Some("demo.tools.yell"));

        let bare = meta.plugin_entry(PluginType::Modules, "shout", None).unwrap();
        assert!(bare.redirect.is_none());
        assert!(bare.deprecation.is_some());

        // Falls back to the bare key when no extension-specific entry exists.
        let fallback = meta.plugin_entry(PluginType::Modules, "ping", Some(".toml")).unwrap();
        assert_eq!(fallback.action_plugin.as_deref(), Some("demo.tools.ping_action"));
    }

    #[test]
    fn import_redirects() {
        let meta = PackMetadata::from_toml_str("demo.tools", RUNTIME).unwrap();
        assert_eq!(
            meta.import_redirect("packs.demo.tools.plugins.module_utils.old"),
            Some("packs.demo.tools.plugins.module_utils.new")
        );
        assert_eq!(meta.import_redirect("packs.demo.tools.plugins"), None);
    }

    #[test]
    fn decodes_json_runtime() {
        let json = r#"{"plugin_routing": {"lookup": {"env2": {"tombstone": {"removal_version": 4}}}}}"#;
        let meta = PackMetadata::from_json_str("demo.tools", json).unwrap();
        let tomb = meta
            .plugin_entry(PluginType::Lookup, "env2", None)
            .and_then(|e| e.tombstone.as_ref())
            .unwrap();
        assert_eq!(tomb.removal_version.as_deref(), Some("4"));
    }

    #[test]
    fn malformed_metadata_is_a_metadata_error() {
        let err = PackMetadata::from_toml_str("demo.tools", "plugin_routing = 7").unwrap_err();
        assert!(matches!(err, CorralError::Metadata { ref pack, .. } if pack == "demo.tools"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_metadata_file_routes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let meta = PackMetadata::load_from_pack_dir("demo.tools", dir.path()).unwrap();
        assert_eq!(meta, PackMetadata::default());
    }
}
