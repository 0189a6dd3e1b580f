// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Corral integration tests.
//!
//! # Components
//!
//! - [`PackTree`] - Temporary directory layouts of pack roots and flat plugin dirs
//! - [`MockClass`] - Plugin class with configurable capabilities that counts instantiations
//! - [`FunctionClass`] - Plugin class whose instances export template functions

pub mod fixture;
pub mod mock_plugin;

pub use fixture::{manifest, PackFixture, PackTree};
pub use mock_plugin::{FunctionClass, MockClass, MockPlugin};
