// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Corral - inspect plugin search paths, resolution and content packs.

mod packs;
mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use corral_core::{CorralError, PluginType};
use corral_plugin::{ManifestSource, PluginLoaders};

/// Corral - plugin and content-pack resolution.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of configuration.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra directories holding `<type>_plugins`-style subdirectories.
    #[arg(long = "plugin-dir", global = true)]
    plugin_dirs: Vec<String>,

    /// Project directories whose `content/` root takes precedence for packs.
    #[arg(long = "project", global = true)]
    projects: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the search directories for a plugin type.
    Paths {
        plugin_type: PluginType,
        /// One directory per line, including nested category directories.
        #[arg(long)]
        expanded: bool,
    },
    /// Resolve a plugin name and show how it was found.
    Resolve {
        plugin_type: PluginType,
        name: String,
        /// Candidate packs for short names, tried in order.
        #[arg(long = "pack")]
        packs: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// List plugin files from the flat search paths.
    List {
        plugin_type: PluginType,
        #[arg(long)]
        json: bool,
    },
    /// Show where packs resolve, or list pack roots.
    Packs {
        names: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => corral_config::load_and_validate_path(path),
        None => corral_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            corral_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    init_tracing(level);

    match run(&cli, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("corral: {e}");
            std::process::exit(1);
        }
    }
}

/// Run the selected command. `Ok(false)` means the command completed but
/// found nothing.
///
/// Every command works on paths and routing only. No plugin is instantiated,
/// so the manifest source carries no implementations.
fn run(cli: &Cli, config: &corral_config::CorralConfig) -> Result<bool, CorralError> {
    let loaders = PluginLoaders::from_config(config, Arc::new(ManifestSource::new()))?;
    loaders.install();
    if !cli.projects.is_empty() {
        loaders.finder().set_project_paths(&cli.projects)?;
    }
    for dir in &cli.plugin_dirs {
        loaders.add_all_plugin_dirs(dir)?;
    }

    match &cli.command {
        Commands::Paths {
            plugin_type,
            expanded,
        } => resolve::run_paths(&loaders, *plugin_type, *expanded).map(|()| true),
        Commands::Resolve {
            plugin_type,
            name,
            packs,
            json,
        } => resolve::run_resolve(&loaders, *plugin_type, name, packs.clone(), *json),
        Commands::List { plugin_type, json } => {
            resolve::run_list(&loaders, *plugin_type, *json).map(|()| true)
        }
        Commands::Packs { names, json } => {
            packs::run_packs(loaders.finder(), names, *json).map(|()| true)
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("corral={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_resolve_with_packs() {
        let cli = Cli::parse_from([
            "corral", "resolve", "lookup", "env", "--pack", "demo.tools", "--pack", "demo.other",
        ]);
        match cli.command {
            Commands::Resolve {
                plugin_type, name, packs, json,
            } => {
                assert_eq!(plugin_type, PluginType::Lookup);
                assert_eq!(name, "env");
                assert_eq!(packs, vec!["demo.tools", "demo.other"]);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_plugin_type() {
        assert!(Cli::try_parse_from(["corral", "paths", "widgets"]).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = corral_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.logging.level, "info");
    }
}
