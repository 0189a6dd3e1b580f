// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request resolution state.

use std::path::PathBuf;
use std::sync::Arc;

use corral_collection::RemovalNotice;
use corral_core::{is_valid_fqcr, CorralError, PluginType, BUILTIN_PACK, LEGACY_PREFIX};
use tracing::warn;

use crate::search_path::SearchPathEntry;

/// Everything learned while resolving one name.
///
/// Created fresh for each top-level request and mutated by each resolution
/// step. When resolution ends, either `resolved` is set together with
/// `resolved_path`, or `exit_reason` explains why nothing was found.
#[derive(Debug, Clone)]
pub struct PluginLoadContext {
    pub plugin_type: PluginType,
    pub original_name: Option<String>,
    /// Every name visited, in order. Revisiting one is a redirect loop.
    pub redirect_list: Vec<String>,
    pub pending_redirect: Option<String>,
    pub resolved: bool,
    pub exit_reason: Option<String>,
    /// Pack-qualified module name, or the short name for flat lookups.
    pub resolved_name: Option<String>,
    pub resolved_path: Option<PathBuf>,
    /// `ns.pack`; `corral.builtin` for internal flat hits, empty for user ones.
    pub resolved_pack: Option<String>,
    /// Non-fatal errors from candidates that did not pan out.
    pub errors: Vec<Arc<CorralError>>,
    pub load_attempts: Vec<String>,
    pub deprecated: bool,
    pub removal_date: Option<String>,
    pub removal_version: Option<String>,
    pub deprecation_warnings: Vec<String>,
    /// Companion action named by a module's routing entry.
    pub action_plugin: Option<String>,
    fqcn: Option<String>,
}

impl PluginLoadContext {
    pub fn new(plugin_type: PluginType) -> Self {
        Self {
            plugin_type,
            original_name: None,
            redirect_list: Vec::new(),
            pending_redirect: None,
            resolved: false,
            exit_reason: None,
            resolved_name: None,
            resolved_path: None,
            resolved_pack: None,
            errors: Vec::new(),
            load_attempts: Vec::new(),
            deprecated: false,
            removal_date: None,
            removal_version: None,
            deprecation_warnings: Vec::new(),
            action_plugin: None,
            fqcn: None,
        }
    }

    /// The fully qualified name of what was resolved.
    ///
    /// Flat hits report the short name, or `corral.builtin.<name>` when
    /// internal. Pack hits report the last name in the redirect chain.
    pub fn resolved_fqcn(&self) -> Option<String> {
        if !self.resolved {
            return None;
        }
        if let Some(fqcn) = &self.fqcn {
            return Some(fqcn.clone());
        }

        let last = self.redirect_list.last()?;
        let last = last.strip_prefix(LEGACY_PREFIX).unwrap_or(last);
        match self.resolved_pack.as_deref() {
            Some(pack) if !pack.is_empty() && !is_valid_fqcr(last) => Some(format!("{pack}.{last}")),
            _ => Some(last.to_string()),
        }
    }

    /// Record a deprecation notice for `name` and log it.
    pub fn record_deprecation(&mut self, name: &str, notice: &RemovalNotice) {
        let text = notice.warning_text.as_deref().unwrap_or_default().trim();
        let mut message = format!("{name} has been deprecated.");
        if !text.is_empty() {
            message.push(' ');
            message.push_str(text);
        }
        match (&notice.removal_date, &notice.removal_version) {
            (Some(date), _) => message.push_str(&format!(" This feature will be removed after {date}.")),
            (None, Some(version)) => {
                message.push_str(&format!(" This feature will be removed in version {version}."))
            }
            (None, None) => {}
        }

        warn!(plugin_type = %self.plugin_type, name = %name, "{message}");

        self.deprecated = true;
        if notice.removal_date.is_some() {
            self.removal_date = notice.removal_date.clone();
        }
        if notice.removal_version.is_some() {
            self.removal_version = notice.removal_version.clone();
        }
        self.deprecation_warnings.push(message);
    }

    /// Mark the step as resolved to a file.
    pub fn resolve(
        &mut self,
        resolved_name: impl Into<String>,
        resolved_path: impl Into<PathBuf>,
        resolved_pack: impl Into<String>,
        exit_reason: impl Into<String>,
        action_plugin: Option<String>,
    ) {
        self.pending_redirect = None;
        self.resolved_name = Some(resolved_name.into());
        self.resolved_path = Some(resolved_path.into());
        self.resolved_pack = Some(resolved_pack.into());
        self.exit_reason = Some(exit_reason.into());
        self.action_plugin = action_plugin;
        self.resolved = true;
    }

    /// Mark a flat-directory hit.
    pub fn resolve_legacy(&mut self, name: &str, entry: &SearchPathEntry) {
        let (pack, fqcn) = if entry.internal {
            (BUILTIN_PACK.to_string(), format!("{BUILTIN_PACK}.{name}"))
        } else {
            (String::new(), name.to_string())
        };
        self.pending_redirect = None;
        self.resolved_name = Some(name.to_string());
        self.resolved_path = Some(entry.path.clone());
        self.resolved_pack = Some(pack);
        self.fqcn = Some(fqcn);
        self.resolved = true;
    }

    /// Mark a hit whose fully qualified name is already known.
    pub fn resolve_known(&mut self, name: &str, path: impl Into<PathBuf>, fqcn: &str) {
        let pack = if fqcn.starts_with(&format!("{BUILTIN_PACK}.")) {
            BUILTIN_PACK.to_string()
        } else {
            String::new()
        };
        self.pending_redirect = None;
        self.resolved_name = Some(name.to_string());
        self.resolved_path = Some(path.into());
        self.resolved_pack = Some(pack);
        self.fqcn = Some(fqcn.to_string());
        self.resolved = true;
    }

    /// Override the fully qualified name reported for this resolution.
    pub fn set_resolved_fqcn(&mut self, fqcn: impl Into<String>) {
        self.fqcn = Some(fqcn.into());
    }

    /// Hand off to another name; the loader loops until it settles.
    pub fn redirect(&mut self, target: impl Into<String>) {
        let target = target.into();
        let original = self.original_name.as_deref().unwrap_or_default();
        self.exit_reason = Some(format!(
            "pending redirect resolution from {original} to {target}"
        ));
        self.pending_redirect = Some(target);
        self.resolved = false;
    }

    /// Mark the step as not found.
    pub fn nope(&mut self, exit_reason: impl Into<String>) {
        self.pending_redirect = None;
        self.exit_reason = Some(exit_reason.into());
        self.resolved = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_has_no_fqcn() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        ctx.redirect_list.push("greet".into());
        assert_eq!(ctx.resolved_fqcn(), None);
    }

    #[test]
    fn pack_hit_reports_last_redirect() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        ctx.redirect_list = vec!["demo.tools.old_greet".into(), "demo.tools.greet".into()];
        ctx.resolve(
            "packs.demo.tools.plugins.modules.greet",
            "/r/greet.toml",
            "demo.tools",
            "found exact match",
            None,
        );
        assert_eq!(ctx.resolved_fqcn().as_deref(), Some("demo.tools.greet"));
    }

    #[test]
    fn legacy_qualifier_is_stripped_and_short_name_qualified() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        ctx.redirect_list = vec!["corral.legacy.ping".into()];
        ctx.resolve("ping", "/r/ping.toml", "demo.tools", "found", None);
        assert_eq!(ctx.resolved_fqcn().as_deref(), Some("demo.tools.ping"));
    }

    #[test]
    fn legacy_hits_qualify_only_internal_names() {
        let mut ctx = PluginLoadContext::new(PluginType::Lookup);
        ctx.resolve_legacy("env", &SearchPathEntry::new("/b/env.toml", true));
        assert_eq!(ctx.resolved_pack.as_deref(), Some(BUILTIN_PACK));
        assert_eq!(ctx.resolved_fqcn().as_deref(), Some("corral.builtin.env"));

        let mut ctx = PluginLoadContext::new(PluginType::Lookup);
        ctx.resolve_legacy("env", &SearchPathEntry::new("/u/env.toml", false));
        assert_eq!(ctx.resolved_pack.as_deref(), Some(""));
        assert_eq!(ctx.resolved_fqcn().as_deref(), Some("env"));
    }

    #[test]
    fn deprecation_is_recorded() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        let notice = RemovalNotice {
            warning_text: Some("Use demo.tools.greet.".into()),
            removal_date: None,
            removal_version: Some("4.0".into()),
        };
        ctx.record_deprecation("demo.tools.old_greet", &notice);

        assert!(ctx.deprecated);
        assert_eq!(ctx.removal_version.as_deref(), Some("4.0"));
        assert_eq!(ctx.deprecation_warnings.len(), 1);
        assert!(ctx.deprecation_warnings[0].starts_with("demo.tools.old_greet has been deprecated. Use"));
    }

    #[test]
    fn redirect_then_resolve_clears_pending() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        ctx.original_name = Some("a.b.c".into());
        ctx.redirect("a.b.d");
        assert_eq!(ctx.pending_redirect.as_deref(), Some("a.b.d"));
        assert!(!ctx.resolved);

        ctx.nope("no match");
        assert!(ctx.pending_redirect.is_none());
        assert_eq!(ctx.exit_reason.as_deref(), Some("no match"));
    }
}
