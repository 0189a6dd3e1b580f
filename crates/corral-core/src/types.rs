// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin categories and capabilities shared by the resolver and loaders.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Category of plugin a loader resolves.
///
/// The snake_case form is the name used inside content packs
/// (`plugins/<type>/`) and in routing metadata.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Action,
    Become,
    Cache,
    Callback,
    Cliconf,
    Connection,
    DocFragments,
    Filter,
    Httpapi,
    Inventory,
    Lookup,
    ModuleUtils,
    Modules,
    Netconf,
    Shell,
    Strategy,
    Terminal,
    Test,
    Vars,
}

impl PluginType {
    /// The name as used in pack package paths and routing tables.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Directory name used by flat (non-pack) plugin roots.
    pub fn legacy_dir(&self) -> String {
        match self {
            PluginType::Modules => "library".to_string(),
            PluginType::ModuleUtils | PluginType::DocFragments => self.as_str().to_string(),
            other => format!("{}_plugins", other.as_str()),
        }
    }

    /// Map a legacy directory name (`action_plugins`, `library`) to its type.
    pub fn from_legacy_dir(dir: &str) -> Option<Self> {
        let name = if dir == "library" {
            "modules"
        } else {
            dir.strip_suffix("_plugins").unwrap_or(dir)
        };
        name.parse().ok()
    }

    /// Whether loaded plugins of this type expose a table of named functions.
    pub fn is_function_table(&self) -> bool {
        matches!(self, PluginType::Filter | PluginType::Test)
    }
}

/// A behavioral interface a plugin class can declare it implements.
///
/// Loaders for some plugin types require one; classes that do not declare it
/// are rejected at load time with a non-conforming diagnostic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Capability {
    ActionBase,
    CallbackBase,
    ConnectionBase,
    LookupBase,
    StrategyBase,
    TerminalBase,
    CliconfBase,
    NetconfBase,
    HttpApiBase,
}
