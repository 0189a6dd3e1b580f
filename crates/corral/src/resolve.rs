// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `corral paths`, `corral resolve` and `corral list`.

use std::path::PathBuf;

use corral_core::{CorralError, PluginType};
use corral_plugin::{FindOptions, PluginLoadContext, PluginLoader, PluginLoaders};
use serde::Serialize;

/// Structured resolution outcome for `--json` mode.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub name: String,
    pub plugin_type: String,
    pub resolved: bool,
    pub path: Option<PathBuf>,
    pub fqcn: Option<String>,
    pub pack: Option<String>,
    pub redirect_list: Vec<String>,
    pub load_attempts: Vec<String>,
    pub exit_reason: Option<String>,
    pub deprecation_warnings: Vec<String>,
    pub action_plugin: Option<String>,
    pub errors: Vec<String>,
}

impl ResolveReport {
    pub fn from_context(name: &str, ctx: &PluginLoadContext) -> Self {
        Self {
            name: name.to_string(),
            plugin_type: ctx.plugin_type.to_string(),
            resolved: ctx.resolved,
            path: ctx.resolved_path.clone().filter(|_| ctx.resolved),
            fqcn: ctx.resolved_fqcn(),
            pack: ctx.resolved_pack.clone().filter(|p| !p.is_empty()),
            redirect_list: ctx.redirect_list.clone(),
            load_attempts: ctx.load_attempts.clone(),
            exit_reason: ctx.exit_reason.clone(),
            deprecation_warnings: ctx.deprecation_warnings.clone(),
            action_plugin: ctx.action_plugin.clone(),
            errors: ctx.errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match (&self.fqcn, &self.path) {
            (Some(fqcn), Some(path)) if self.resolved => {
                out.push_str(&format!("{} -> {fqcn}\n  path: {}\n", self.name, path.display()));
            }
            _ => out.push_str(&format!("{}: not found\n", self.name)),
        }
        if self.redirect_list.len() > 1 {
            out.push_str(&format!("  via: {}\n", self.redirect_list.join(" -> ")));
        }
        if let Some(action) = &self.action_plugin {
            out.push_str(&format!("  action: {action}\n"));
        }
        for warning in &self.deprecation_warnings {
            out.push_str(&format!("  deprecated: {warning}\n"));
        }
        if !self.resolved {
            if let Some(reason) = &self.exit_reason {
                out.push_str(&format!("  reason: {reason}\n"));
            }
            for error in &self.errors {
                out.push_str(&format!("  error: {error}\n"));
            }
        }
        out
    }
}

fn loader_for(loaders: &PluginLoaders, plugin_type: PluginType) -> Result<&PluginLoader, CorralError> {
    loaders
        .loader(plugin_type)
        .ok_or_else(|| CorralError::Internal(format!("no loader for {plugin_type}")))
}

/// Print the search directories of one plugin type.
pub fn run_paths(loaders: &PluginLoaders, plugin_type: PluginType, expanded: bool) -> Result<(), CorralError> {
    let loader = loader_for(loaders, plugin_type)?;
    if expanded {
        for path in loader.search_paths()? {
            println!("{}", path.display());
        }
    } else {
        println!("{}", loader.print_paths()?);
    }
    Ok(())
}

/// Resolve one name and report how.
pub fn run_resolve(
    loaders: &PluginLoaders,
    plugin_type: PluginType,
    name: &str,
    packs: Vec<String>,
    json: bool,
) -> Result<bool, CorralError> {
    let loader = loader_for(loaders, plugin_type)?;
    let options = FindOptions {
        collection_list: (!packs.is_empty()).then_some(packs),
        check_aliases: true,
        ..FindOptions::default()
    };
    let ctx = loader.find_plugin_with_context(name, &options)?;
    let report = ResolveReport::from_context(name, &ctx);

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(report.resolved)
}

/// List every plugin file the flat search paths provide.
pub fn run_list(loaders: &PluginLoaders, plugin_type: PluginType, json: bool) -> Result<(), CorralError> {
    let paths = loader_for(loaders, plugin_type)?.all_paths()?;
    if json {
        println!("{}", to_json(&paths)?);
    } else {
        for path in paths {
            println!("{}", path.display());
        }
    }
    Ok(())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, CorralError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CorralError::Internal(format!("failed to serialize output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn resolve_needs_no_plugin_implementations() {
        use corral_plugin::ManifestSource;
        use corral_test_utils::{manifest, PackTree};

        let tree = PackTree::new();
        tree.pack("site", "demo.tools").with_plugin(
            PluginType::Lookup,
            "env.toml",
            &manifest(&[("LookupModule", "env")]),
        );
        let config = corral_config::load_and_validate_str(&format!(
            "[packs]\npaths = [{:?}]\n",
            tree.root("site").display().to_string()
        ))
        .unwrap();
        let loaders = PluginLoaders::from_config(&config, Arc::new(ManifestSource::new())).unwrap();

        assert!(run_resolve(&loaders, PluginType::Lookup, "demo.tools.env", vec![], true).unwrap());
        assert!(!run_resolve(&loaders, PluginType::Lookup, "demo.tools.nope", vec![], true).unwrap());
    }

    #[test]
    fn unresolved_report_explains_why() {
        let mut ctx = PluginLoadContext::new(PluginType::Lookup);
        ctx.redirect_list.push("nope".into());
        ctx.nope("no matches found for nope");
        ctx.errors.push(Arc::new(CorralError::PackNotFound("demo.tools".into())));

        let report = ResolveReport::from_context("nope", &ctx);
        assert!(!report.resolved);
        assert_eq!(report.path, None);
        let text = report.render();
        assert!(text.starts_with("nope: not found"));
        assert!(text.contains("reason: no matches found for nope"));
        assert!(text.contains("content pack not found: demo.tools"));
    }

    #[test]
    fn resolved_report_shows_chain() {
        let mut ctx = PluginLoadContext::new(PluginType::Modules);
        ctx.original_name = Some("demo.tools.old_greet".into());
        ctx.redirect_list = vec!["demo.tools.old_greet".into(), "demo.tools.greet".into()];
        ctx.resolve(
            "packs.demo.tools.plugins.modules.greet",
            "/packs/demo/tools/plugins/modules/greet.sh",
            "demo.tools",
            "found exact match",
            Some("demo.tools.greet_action".into()),
        );

        let report = ResolveReport::from_context("demo.tools.old_greet", &ctx);
        assert_eq!(report.fqcn.as_deref(), Some("demo.tools.greet"));
        assert_eq!(report.pack.as_deref(), Some("demo.tools"));
        let text = report.render();
        assert!(text.contains("demo.tools.old_greet -> demo.tools.greet"));
        assert!(text.contains("via: demo.tools.old_greet -> demo.tools.greet"));
        assert!(text.contains("action: demo.tools.greet_action"));

        let json = to_json(&report).unwrap();
        assert!(json.contains("\"resolved\": true"));
    }
}
