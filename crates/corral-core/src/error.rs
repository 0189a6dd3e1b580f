// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Corral plugin loader.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across plugin resolution and loading.
///
/// Not-found is deliberately absent: an unresolved lookup is reported through
/// the load context, and the caller decides whether a missing plugin matters.
#[derive(Debug, Error)]
pub enum CorralError {
    /// Configuration errors (invalid TOML, bad filter file, bad paths).
    #[error("configuration error: {0}")]
    Config(String),

    /// A reference that does not parse as the requested form.
    #[error("invalid plugin reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A redirect chain revisited a name it had already passed through.
    #[error("plugin redirect loop resolving {name} (path: {})", chain.join(" -> "))]
    CircularRedirect { name: String, chain: Vec<String> },

    /// The routing metadata tombstones the requested resource.
    #[error("{name} has been removed. {detail}")]
    PluginRemoved {
        name: String,
        detail: String,
        removal_version: Option<String>,
        removal_date: Option<String>,
    },

    /// A routing entry redirects to something that is not fully qualified.
    #[error("{name} redirects to `{target}`, which is not a fully qualified reference")]
    InvalidRedirect { name: String, target: String },

    /// A content pack declared a runtime requirement this build cannot satisfy.
    #[error("pack {pack} requires corral {requirement}, running {version}")]
    UnsupportedVersion {
        pack: String,
        version: String,
        requirement: String,
    },

    /// No configured root provides the requested content pack.
    #[error("content pack not found: {0}")]
    PackNotFound(String),

    /// No module could be located for a virtual package name.
    #[error("no module named {0}")]
    ModuleNotFound(String),

    /// Routing metadata could not be read or decoded.
    #[error("invalid routing metadata for {pack}: {message}")]
    Metadata { pack: String, message: String },

    /// A plugin file could not be turned into a loaded module.
    #[error("failed to load plugin from {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// A plugin class lacks the capability its loader requires.
    #[error("{name} does not provide the required {capability} capability")]
    NonConforming { name: String, capability: String },

    /// Filesystem access failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CorralError {
    /// Build a removal error, folding the version or date into the message.
    pub fn removed(
        name: impl Into<String>,
        warning_text: Option<&str>,
        removal_version: Option<String>,
        removal_date: Option<String>,
    ) -> Self {
        let mut detail = match (&removal_version, &removal_date) {
            (Some(version), _) => format!("It was removed in version {version}."),
            (None, Some(date)) => format!("It was removed after {date}."),
            (None, None) => "It has been permanently removed.".to_string(),
        };
        if let Some(text) = warning_text.filter(|t| !t.trim().is_empty()) {
            detail.push(' ');
            detail.push_str(text.trim());
        }
        CorralError::PluginRemoved {
            name: name.into(),
            detail,
            removal_version,
            removal_date,
        }
    }

    /// Fatal errors abort resolution instead of being collected per candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CorralError::CircularRedirect { .. }
                | CorralError::PluginRemoved { .. }
                | CorralError::InvalidRedirect { .. }
                | CorralError::UnsupportedVersion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_message_names_version() {
        let err = CorralError::removed(
            "demo.tools.legacy_tool",
            Some("Use demo.tools.greet instead."),
            Some("3.0".into()),
            None,
        );
        let msg = err.to_string();
        assert!(msg.contains("demo.tools.legacy_tool"));
        assert!(msg.contains("3.0"));
        assert!(msg.contains("Use demo.tools.greet instead."));
    }

    #[test]
    fn removed_message_falls_back_to_date() {
        let err = CorralError::removed("a.b.c", None, None, Some("2025-01-01".into()));
        assert!(err.to_string().contains("2025-01-01"));
    }

    #[test]
    fn fatal_classification() {
        assert!(
            CorralError::CircularRedirect {
                name: "a".into(),
                chain: vec!["a".into(), "b".into()],
            }
            .is_fatal()
        );
        assert!(
            CorralError::InvalidRedirect {
                name: "a.b.c".into(),
                target: "nope".into(),
            }
            .is_fatal()
        );
        assert!(!CorralError::ModuleNotFound("packs.x".into()).is_fatal());
        assert!(
            !CorralError::Load {
                path: "/tmp/x.toml".into(),
                message: "bad".into(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn circular_message_shows_chain() {
        let err = CorralError::CircularRedirect {
            name: "a.b.x".into(),
            chain: vec!["a.b.x".into(), "a.b.y".into(), "a.b.x".into()],
        };
        assert!(err.to_string().contains("a.b.x -> a.b.y -> a.b.x"));
    }
}
