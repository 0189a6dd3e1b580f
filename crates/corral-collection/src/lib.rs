// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-pack resolution for the Corral plugin loader.
//!
//! Content packs live under `<root>/packs/<namespace>/<pack>/` in one or more
//! roots. [`CollectionFinder`] turns virtual package names such as
//! `packs.demo.tools.plugins.lookup` into directories, honouring pack-level
//! precedence, routing metadata and subtree redirects.

pub mod events;
pub mod finder;
pub mod node;
pub mod redirect;
pub mod registry;
pub mod routing;

pub use events::{PackLoadHooks, PackLoadListener, PackLoaded};
pub use finder::{CollectionFinder, ModuleInfo, MODULE_EXT, PACKAGE_INIT};
pub use node::{ModuleNode, NodeKind, PackHandle};
pub use redirect::{ancestor_redirect, RedirectTable};
pub use routing::{ImportRedirect, PackMetadata, RemovalNotice, RoutingEntry};
