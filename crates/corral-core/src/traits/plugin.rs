// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin class and instance traits.
//!
//! A loaded plugin file exports one or more [`PluginClass`] values. The loader
//! checks the class against its required [`Capability`], then asks it for an
//! instance. Instances are opaque to the loader beyond the operations here;
//! callers recover the concrete type through [`Plugin::as_any`].

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CorralError;
use crate::types::Capability;

/// A single template function (filter or test) exported by a plugin.
pub type TemplateFunction = Arc<dyn Fn(&[Value]) -> Result<Value, CorralError> + Send + Sync>;

/// Named template functions exported by one plugin instance.
pub type FunctionMap = BTreeMap<String, TemplateFunction>;

/// A plugin instance produced by a [`PluginClass`].
pub trait Plugin: Any + Send + Sync {
    /// Downcast support for callers that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Functions this instance exposes to the templating layer, if any.
    fn functions(&self) -> Option<FunctionMap> {
        None
    }
}

/// Factory for plugin instances, found by name among a module's exports.
pub trait PluginClass: Send + Sync {
    /// Export name the loader looks for (`ActionModule`, `LookupModule`, ...).
    fn class_name(&self) -> &str;

    /// Interfaces this class implements.
    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    /// Stateless classes may have their instances shared between callers.
    fn is_stateless(&self) -> bool {
        false
    }

    /// Create a new instance from caller-supplied arguments.
    fn instantiate(&self, args: &Value) -> Result<Arc<dyn Plugin>, CorralError>;

    /// Whether this class declares `capability`.
    fn provides(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Debug for dyn PluginClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClass")
            .field("class_name", &self.class_name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
