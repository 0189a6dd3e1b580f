// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification fired the first time a content pack is loaded.
//!
//! Listeners receive the pack's identity, root and metadata. An error from a
//! listener aborts the pack load, which is how compatibility checks veto a pack.

use std::path::Path;
use std::sync::{Arc, RwLock};

use corral_core::CorralError;

use crate::routing::PackMetadata;

/// Details of a freshly loaded pack.
#[derive(Debug, Clone, Copy)]
pub struct PackLoaded<'a> {
    pub name: &'a str,
    pub root: Option<&'a Path>,
    pub metadata: &'a PackMetadata,
}

/// Subscriber to pack-loaded notifications.
pub trait PackLoadListener: Send + Sync {
    fn on_pack_loaded(&self, event: &PackLoaded<'_>) -> Result<(), CorralError>;
}

impl<F> PackLoadListener for F
where
    F: Fn(&PackLoaded<'_>) -> Result<(), CorralError> + Send + Sync,
{
    fn on_pack_loaded(&self, event: &PackLoaded<'_>) -> Result<(), CorralError> {
        self(event)
    }
}

/// Ordered set of pack-loaded listeners.
#[derive(Default)]
pub struct PackLoadHooks {
    listeners: RwLock<Vec<Arc<dyn PackLoadListener>>>,
}

impl PackLoadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn PackLoadListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every listener in subscription order; the first error wins.
    pub fn fire(&self, event: &PackLoaded<'_>) -> Result<(), CorralError> {
        // Snapshot so listeners can subscribe or resolve without deadlocking.
        let listeners: Vec<_> = match self.listeners.read() {
            Ok(l) => l.clone(),
            Err(_) => return Err(CorralError::Internal("pack hook lock poisoned".into())),
        };
        for listener in listeners {
            listener.on_pack_loaded(event)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PackLoadHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackLoadHooks")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn listeners_run_in_order() {
        let hooks = PackLoadHooks::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            hooks.subscribe(Arc::new(move |e: &PackLoaded<'_>| -> Result<(), CorralError> {
                seen.lock().unwrap().push(format!("{tag}:{}", e.name));
                Ok(())
            }));
        }

        let meta = PackMetadata::default();
        hooks
            .fire(&PackLoaded {
                name: "demo.tools",
                root: None,
                metadata: &meta,
            })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first:demo.tools", "second:demo.tools"]);
    }

    #[test]
    fn first_error_stops_dispatch() {
        let hooks = PackLoadHooks::new();
        let reached = Arc::new(Mutex::new(false));
        hooks.subscribe(Arc::new(|_: &PackLoaded<'_>| -> Result<(), CorralError> {
            Err(CorralError::Internal("veto".into()))
        }));
        let flag = reached.clone();
        hooks.subscribe(Arc::new(move |_: &PackLoaded<'_>| -> Result<(), CorralError> {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        let meta = PackMetadata::default();
        let err = hooks
            .fire(&PackLoaded {
                name: "demo.tools",
                root: None,
                metadata: &meta,
            })
            .unwrap_err();
        assert!(err.to_string().contains("veto"));
        assert!(!*reached.lock().unwrap());
    }
}
