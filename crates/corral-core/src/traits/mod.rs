// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for loadable plugins.

pub mod plugin;

pub use plugin::{FunctionMap, Plugin, PluginClass, TemplateFunction};
