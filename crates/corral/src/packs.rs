// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `corral packs`: where each pack resolves and what its routing declares.

use std::path::PathBuf;

use corral_collection::CollectionFinder;
use corral_core::CorralError;
use serde::Serialize;
use tracing::debug;

use crate::resolve::to_json;

/// One pack's resolution, for `--json` mode.
#[derive(Debug, Serialize)]
pub struct PackReport {
    pub name: String,
    pub found: bool,
    pub root: Option<PathBuf>,
    pub requires_corral: Option<String>,
    pub routed: usize,
    pub import_redirects: usize,
    pub error: Option<String>,
}

impl PackReport {
    pub fn inspect(finder: &CollectionFinder, name: &str) -> Result<Self, CorralError> {
        match finder.pack(name) {
            Ok(pack) => Ok(Self {
                name: name.to_string(),
                found: true,
                root: pack.root.clone(),
                requires_corral: pack.metadata.requires_corral.clone(),
                routed: pack.metadata.plugin_routing.values().map(|m| m.len()).sum(),
                import_redirects: pack.metadata.import_redirection.len(),
                error: None,
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(pack = %name, error = %e, "pack not available");
                Ok(Self {
                    name: name.to_string(),
                    found: false,
                    root: None,
                    requires_corral: None,
                    routed: 0,
                    import_redirects: 0,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    pub fn render(&self) -> String {
        if !self.found {
            return format!(
                "{}: not found ({})\n",
                self.name,
                self.error.as_deref().unwrap_or("unknown")
            );
        }
        let root = self
            .root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built in)".to_string());
        let mut out = format!("{}\n  root: {root}\n", self.name);
        if let Some(req) = &self.requires_corral {
            out.push_str(&format!("  requires corral: {req}\n"));
        }
        out.push_str(&format!(
            "  routing entries: {}, import redirects: {}\n",
            self.routed, self.import_redirects
        ));
        out
    }
}

/// Report on each named pack, or list the pack roots when none are named.
pub fn run_packs(finder: &CollectionFinder, names: &[String], json: bool) -> Result<(), CorralError> {
    if names.is_empty() {
        let roots = finder.pack_roots()?;
        if json {
            println!("{}", to_json(&roots)?);
        } else {
            for root in roots {
                println!("{}", root.display());
            }
        }
        return Ok(());
    }

    let reports = names
        .iter()
        .map(|name| PackReport::inspect(finder, name))
        .collect::<Result<Vec<_>, _>>()?;
    if json {
        println!("{}", to_json(&reports)?);
    } else {
        for report in &reports {
            print!("{}", report.render());
        }
    }
    Ok(())
}
