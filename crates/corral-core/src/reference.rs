// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fully qualified plugin references (`ns.pack[.subdirs].resource`).
//!
//! A reference maps onto the virtual package tree rooted at [`ROOT_PACKAGE`]:
//! `ns.pack.sub.thing` of type `lookup` lives in package
//! `packs.ns.pack.plugins.lookup.sub` as resource `thing`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CorralError;
use crate::types::PluginType;

/// Name of the umbrella virtual package, and the marker directory each
/// content root must contain to take part in pack resolution.
pub const ROOT_PACKAGE: &str = "packs";

/// Namespace reserved for content that ships with Corral itself.
pub const RESERVED_NAMESPACE: &str = "corral";

/// The built-in pack. It has routing metadata but no on-disk pack root.
pub const BUILTIN_PACK: &str = "corral.builtin";

/// Qualifier that forces a flat directory scan for the rest of the name.
pub const LEGACY_PREFIX: &str = "corral.legacy.";

static FQCR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+(\.\w+){2,}$").unwrap());
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static SUBDIRS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+(\.\w+)*$").unwrap());

/// A parsed, fully qualified reference to a plugin inside a content pack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginRef {
    /// `ns.pack`
    pub pack: String,
    /// Dotted path between the pack and the resource, empty when absent.
    pub subdirs: String,
    /// Final name segment.
    pub resource: String,
    pub plugin_type: PluginType,
}

impl PluginRef {
    /// Parse a fully qualified reference for the given plugin type.
    pub fn from_fqcr(reference: &str, plugin_type: PluginType) -> Result<Self, CorralError> {
        let invalid = |reason: &str| CorralError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if !is_valid_fqcr(reference) {
            return Err(invalid("expected ns.pack.resource"));
        }

        let (package, resource) = reference
            .rsplit_once('.')
            .ok_or_else(|| invalid("missing resource name"))?;

        let mut parts = package.splitn(3, '.');
        let namespace = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        let subdirs = parts.next().unwrap_or_default();
        let pack = format!("{namespace}.{name}");

        if !is_valid_pack_name(&pack) {
            return Err(invalid("namespace and pack name must be identifiers"));
        }
        if !subdirs.is_empty() && !SUBDIRS_RE.is_match(subdirs) {
            return Err(invalid("malformed subdirectory path"));
        }

        Ok(Self {
            pack,
            subdirs: subdirs.to_string(),
            resource: resource.to_string(),
            plugin_type,
        })
    }

    /// Like [`PluginRef::from_fqcr`], but `None` instead of an error.
    pub fn try_parse_fqcr(reference: &str, plugin_type: PluginType) -> Option<Self> {
        Self::from_fqcr(reference, plugin_type).ok()
    }

    /// The pack's own package: `packs.ns.pack`.
    pub fn pack_package_name(&self) -> String {
        format!("{ROOT_PACKAGE}.{}", self.pack)
    }

    /// The package that holds the resource:
    /// `packs.ns.pack.plugins.<type>[.<subdirs>]`.
    pub fn package_name(&self) -> String {
        let mut name = format!("{}.plugins.{}", self.pack_package_name(), self.plugin_type);
        if !self.subdirs.is_empty() {
            name.push('.');
            name.push_str(&self.subdirs);
        }
        name
    }

    /// The reference in its canonical dotted form.
    pub fn fqcr(&self) -> String {
        if self.subdirs.is_empty() {
            format!("{}.{}", self.pack, self.resource)
        } else {
            format!("{}.{}.{}", self.pack, self.subdirs, self.resource)
        }
    }

    /// Whether this reference points into the built-in pack.
    pub fn is_builtin(&self) -> bool {
        self.pack == BUILTIN_PACK
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqcr())
    }
}

/// Whether `reference` has the shape of a fully qualified reference.
pub fn is_valid_fqcr(reference: &str) -> bool {
    FQCR_RE.is_match(reference)
}

/// Whether `name` is a well-formed `ns.pack` pair.
pub fn is_valid_pack_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((ns, pack)) => IDENT_RE.is_match(ns) && IDENT_RE.is_match(pack),
        None => false,
    }
}
