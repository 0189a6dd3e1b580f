// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock plugin classes for deterministic loader tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use corral_core::{Capability, CorralError, FunctionMap, Plugin, PluginClass, TemplateFunction};
use serde_json::Value;

/// Instance produced by [`MockClass`]; remembers its constructor arguments.
#[derive(Debug)]
pub struct MockPlugin {
    pub class_name: String,
    pub args: Value,
}

impl Plugin for MockPlugin {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A plugin class with configurable capabilities.
pub struct MockClass {
    class_name: String,
    capabilities: Vec<Capability>,
    stateless: bool,
    fail: bool,
    instantiations: AtomicUsize,
}

impl MockClass {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            capabilities: Vec::new(),
            stateless: false,
            fail: false,
            instantiations: AtomicUsize::new(0),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Mark instances as shareable.
    pub fn stateless(mut self) -> Self {
        self.stateless = true;
        self
    }

    /// Make every instantiation fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of instances created so far.
    pub fn instantiations(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }
}

impl PluginClass for MockClass {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn is_stateless(&self) -> bool {
        self.stateless
    }

    fn instantiate(&self, args: &Value) -> Result<Arc<dyn Plugin>, CorralError> {
        if self.fail {
            return Err(CorralError::Internal(format!("{} refused to start", self.class_name)));
        }
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPlugin {
            class_name: self.class_name.clone(),
            args: args.clone(),
        }))
    }
}

/// A class whose instances export template functions.
///
/// Each function returns `"<tag>:<function>:<first arg>"`, so tests can tell
/// which file a function came from.
pub struct FunctionClass {
    class_name: String,
    tag: String,
    functions: Vec<String>,
}

impl FunctionClass {
    pub fn new(class_name: &str, tag: &str, functions: &[&str]) -> Self {
        Self {
            class_name: class_name.to_string(),
            tag: tag.to_string(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }
}

struct FunctionPlugin {
    functions: FunctionMap,
}

impl Plugin for FunctionPlugin {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn functions(&self) -> Option<FunctionMap> {
        Some(self.functions.clone())
    }
}

impl PluginClass for FunctionClass {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn instantiate(&self, _args: &Value) -> Result<Arc<dyn Plugin>, CorralError> {
        let mut functions = FunctionMap::new();
        for name in &self.functions {
            let label = format!("{}:{name}", self.tag);
            let f: TemplateFunction = Arc::new(move |args: &[Value]| {
                let first = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(Value::String(format!("{label}:{first}")))
            });
            functions.insert(name.clone(), f);
        }
        Ok(Arc::new(FunctionPlugin { functions }))
    }
}
