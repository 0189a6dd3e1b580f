// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A loaded plugin together with how it was found.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use corral_core::{CorralError, FunctionMap, Plugin, PluginClass};
use serde_json::Value;

/// A resolved plugin: its class, optional instance, and naming metadata.
#[derive(Clone)]
pub struct PluginHandle {
    name: String,
    load_name: String,
    path: PathBuf,
    aliases: Vec<String>,
    class: Arc<dyn PluginClass>,
    instance: Option<Arc<dyn Plugin>>,
}

impl PluginHandle {
    /// `redirect_list` is the chain of names that led here, oldest first.
    pub fn new(
        name: impl Into<String>,
        load_name: impl Into<String>,
        path: impl Into<PathBuf>,
        redirect_list: &[String],
        class: Arc<dyn PluginClass>,
        instance: Option<Arc<dyn Plugin>>,
    ) -> Self {
        let name = name.into();
        let mut aliases = vec![name.clone()];
        aliases.extend(redirect_list.iter().rev().cloned());
        Self {
            name,
            load_name: load_name.into(),
            path: path.into(),
            aliases,
            class,
            instance,
        }
    }

    /// Fully qualified name the plugin resolved to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the file was loaded under.
    pub fn load_name(&self) -> &str {
        &self.load_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved name first, then every name that redirected here, newest first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn class(&self) -> &Arc<dyn PluginClass> {
        &self.class
    }

    /// `None` when the caller asked for the class only.
    pub fn instance(&self) -> Option<&Arc<dyn Plugin>> {
        self.instance.as_ref()
    }

    pub fn downcast_ref<T: Plugin>(&self) -> Option<&T> {
        self.instance.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub fn functions(&self) -> Option<FunctionMap> {
        self.instance.as_ref()?.functions()
    }

    /// Call one of the instance's template functions.
    pub fn call(&self, function: &str, args: &[Value]) -> Result<Value, CorralError> {
        let functions = self.functions().ok_or_else(|| {
            CorralError::Internal(format!("{} does not export template functions", self.name))
        })?;
        let f = functions.get(function).ok_or_else(|| {
            CorralError::Internal(format!("{} has no function named {function}", self.name))
        })?;
        f(args)
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("load_name", &self.load_name)
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("class", &self.class.class_name())
            .field("instantiated", &self.instance.is_some())
            .finish()
    }
}
