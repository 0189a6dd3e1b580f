// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Corral plugin loader.
//!
//! This crate provides the error type, plugin categories, fully qualified
//! reference parsing, and the traits every loadable plugin implements. The
//! resolver (`corral-collection`) and the loaders (`corral-plugin`) build on
//! the types defined here.

pub mod error;
pub mod reference;
pub mod traits;
pub mod types;

pub use error::CorralError;
pub use reference::{
    is_valid_fqcr, is_valid_pack_name, PluginRef, BUILTIN_PACK, LEGACY_PREFIX,
    RESERVED_NAMESPACE, ROOT_PACKAGE,
};
pub use traits::{FunctionMap, Plugin, PluginClass, TemplateFunction};
pub use types::{Capability, PluginType};
