// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide finder registration.
//!
//! Components that cannot be handed a finder explicitly (for example code
//! asking which pack a path belongs to) look up the installed one here.

use std::sync::{Arc, LazyLock, Mutex};

use tracing::debug;

use crate::finder::CollectionFinder;

static INSTALLED: LazyLock<Mutex<Option<Arc<CollectionFinder>>>> =
    LazyLock::new(|| Mutex::new(None));

/// Install `finder` as the process-wide finder, replacing any previous one.
///
/// Returns the finder that was installed before, if any.
pub fn install(finder: Arc<CollectionFinder>) -> Option<Arc<CollectionFinder>> {
    let mut slot = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
    let previous = slot.replace(finder);
    if previous.is_some() {
        debug!("replacing previously installed collection finder");
    }
    previous
}

/// The currently installed finder.
pub fn installed() -> Option<Arc<CollectionFinder>> {
    INSTALLED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Return the installed finder, building and installing one with `init` if none is.
pub fn get_or_install<F>(init: F) -> Arc<CollectionFinder>
where
    F: FnOnce() -> CollectionFinder,
{
    let mut slot = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
    slot.get_or_insert_with(|| Arc::new(init())).clone()
}

/// Remove the installed finder.
pub fn uninstall() -> Option<Arc<CollectionFinder>> {
    INSTALLED.lock().unwrap_or_else(|e| e.into_inner()).take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;

    fn empty_finder() -> CollectionFinder {
        CollectionFinder::new(Vec::<PathBuf>::new())
    }

    #[test]
    #[serial]
    fn install_replaces_previous() {
        uninstall();
        let first = Arc::new(empty_finder());
        let second = Arc::new(empty_finder());

        assert!(install(first.clone()).is_none());
        let previous = install(second.clone()).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(&installed().unwrap(), &second));

        uninstall();
        assert!(installed().is_none());
    }

    #[test]
    #[serial]
    fn get_or_install_builds_once() {
        uninstall();
        let a = get_or_install(empty_finder);
        let b = get_or_install(|| panic!("factory must not run twice"));
        assert!(Arc::ptr_eq(&a, &b));
        uninstall();
    }
}
