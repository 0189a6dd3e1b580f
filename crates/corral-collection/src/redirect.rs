// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subtree redirects.
//!
//! When a package is explicitly redirected, every descendant requested under
//! the old name must resolve beneath the new one. The table records
//! `original package -> target package`; rewriting is a pure function over it.

use std::collections::HashMap;

/// Recorded package-level redirects, keyed by the original package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectTable {
    entries: HashMap<String, String>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `package` now lives at `target`.
    pub fn insert(&mut self, package: impl Into<String>, target: impl Into<String>) {
        self.entries.insert(package.into(), target.into());
    }

    pub fn get(&self, package: &str) -> Option<&str> {
        self.entries.get(package).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Rewrite `fullname` if any of its ancestor packages was redirected.
///
/// The nearest redirected ancestor wins; its target replaces that prefix and
/// the remainder of the name is kept. A name is never its own ancestor.
pub fn ancestor_redirect(fullname: &str, table: &RedirectTable) -> Option<String> {
    let mut current = fullname;
    while let Some((parent, _)) = current.rsplit_once('.') {
        if let Some(target) = table.get(parent) {
            return Some(format!("{target}{}", &fullname[parent.len()..]));
        }
        current = parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rewrites_descendant_of_redirected_package() {
        let mut table = RedirectTable::new();
        table.insert("packs.a.b.plugins.module_utils.old", "packs.c.d.plugins.module_utils.new");

        assert_eq!(
            ancestor_redirect("packs.a.b.plugins.module_utils.old.sub.leaf", &table).as_deref(),
            Some("packs.c.d.plugins.module_utils.new.sub.leaf")
        );
    }

    #[test]
    fn exact_name_is_not_its_own_ancestor() {
        let mut table = RedirectTable::new();
        table.insert("packs.a.b.x", "packs.c.d.x");
        assert_eq!(ancestor_redirect("packs.a.b.x", &table), None);
    }

    #[test]
    fn nearest_ancestor_wins() {
        let mut table = RedirectTable::new();
        table.insert("packs.a.b", "packs.z.z");
        table.insert("packs.a.b.plugins", "packs.y.y.plugins");
        assert_eq!(
            ancestor_redirect("packs.a.b.plugins.lookup", &table).as_deref(),
            Some("packs.y.y.plugins.lookup")
        );
    }

    #[test]
    fn sibling_with_shared_prefix_untouched() {
        let mut table = RedirectTable::new();
        table.insert("packs.a.b.util", "packs.c.d.util");
        assert_eq!(ancestor_redirect("packs.a.b.utils.x", &table), None);
    }

    proptest! {
        #[test]
        fn empty_table_never_rewrites(name in "[a-z]{1,5}(\\.[a-z]{1,5}){0,6}") {
            prop_assert_eq!(ancestor_redirect(&name, &RedirectTable::new()), None);
        }

        #[test]
        fn rewrite_preserves_suffix(
            prefix in "[a-z]{1,5}(\\.[a-z]{1,5}){0,3}",
            target in "[a-z]{1,5}(\\.[a-z]{1,5}){0,3}",
            suffix in "(\\.[a-z]{1,5}){1,4}",
        ) {
            let mut table = RedirectTable::new();
            table.insert(prefix.clone(), target.clone());
            let name = format!("{prefix}{suffix}");
            prop_assert_eq!(ancestor_redirect(&name, &table), Some(format!("{target}{suffix}")));
        }
    }
}
