// SPDX-FileCopyrightText: 2026 Corral Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime compatibility check for content packs.
//!
//! Subscribed to the finder's pack-loaded notification. A pack's
//! `requires_corral` requirement is compared against the running version with
//! pre-release tags stripped; the configured behaviour decides what a mismatch
//! does.

use corral_collection::{PackLoadListener, PackLoaded};
use corral_config::MismatchBehavior;
use corral_core::CorralError;
use semver::{Version, VersionReq};
use tracing::{debug, warn};

/// Checks `requires_corral` on every pack load.
#[derive(Debug, Clone)]
pub struct VersionGate {
    version: Version,
    behavior: MismatchBehavior,
}

impl VersionGate {
    /// Gate against the version of this build.
    pub fn new(behavior: MismatchBehavior) -> Self {
        let version = Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0));
        Self::with_version(version, behavior)
    }

    pub fn with_version(version: Version, behavior: MismatchBehavior) -> Self {
        let version = Version::new(version.major, version.minor, version.patch);
        Self { version, behavior }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether `requirement` accepts the running version. Empty means any.
    pub fn supports(&self, requirement: &str) -> Result<bool, semver::Error> {
        let requirement = requirement.trim();
        if requirement.is_empty() {
            return Ok(true);
        }
        Ok(VersionReq::parse(requirement)?.matches(&self.version))
    }
}

impl PackLoadListener for VersionGate {
    fn on_pack_loaded(&self, event: &PackLoaded<'_>) -> Result<(), CorralError> {
        debug!(pack = %event.name, root = ?event.root, "checking pack compatibility");

        let Some(requirement) = event.metadata.requires_corral.as_deref() else {
            return Ok(());
        };

        match self.supports(requirement) {
            Ok(true) => Ok(()),
            Ok(false) => match self.behavior {
                MismatchBehavior::Ignore => Ok(()),
                MismatchBehavior::Warning => {
                    warn!(
                        pack = %event.name,
                        requirement = %requirement,
                        version = %self.version,
                        "pack does not support this corral version"
                    );
                    Ok(())
                }
                MismatchBehavior::Error => Err(CorralError::UnsupportedVersion {
                    pack: event.name.to_string(),
                    version: self.version.to_string(),
                    requirement: requirement.to_string(),
                }),
            },
            Err(e) => {
                warn!(
                    pack = %event.name,
                    requirement = %requirement,
                    error = %e,
                    "unable to parse requires_corral"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_collection::PackMetadata;

    fn metadata(requirement: &str) -> PackMetadata {
        PackMetadata {
            requires_corral: Some(requirement.to_string()),
            ..PackMetadata::default()
        }
    }

    fn event<'a>(metadata: &'a PackMetadata) -> PackLoaded<'a> {
        PackLoaded {
            name: "demo.tools",
            root: None,
            metadata,
        }
    }

    #[test]
    fn prerelease_is_stripped() {
        let gate = VersionGate::with_version(Version::parse("2.1.0-beta.1").unwrap(), MismatchBehavior::Error);
        assert_eq!(gate.version(), &Version::new(2, 1, 0));
        assert!(gate.supports(">=2.1").unwrap());
        assert!(gate.supports("").unwrap());
    }

    #[test]
    fn mismatch_errors_when_configured() {
        let gate = VersionGate::with_version(Version::new(1, 0, 0), MismatchBehavior::Error);
        let meta = metadata(">=2.0");
        let err = gate.on_pack_loaded(&event(&meta)).unwrap_err();
        assert!(matches!(err, CorralError::UnsupportedVersion { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn mismatch_is_tolerated_otherwise() {
        let meta = metadata(">=2.0");
        for behavior in [MismatchBehavior::Ignore, MismatchBehavior::Warning] {
            let gate = VersionGate::with_version(Version::new(1, 0, 0), behavior);
            assert!(gate.on_pack_loaded(&event(&meta)).is_ok());
        }
    }

    #[test]
    fn unparsable_requirement_is_not_fatal() {
        let gate = VersionGate::with_version(Version::new(1, 0, 0), MismatchBehavior::Error);
        let meta = metadata("not a version");
        assert!(gate.on_pack_loaded(&event(&meta)).is_ok());
    }

    #[test]
    fn absent_requirement_passes() {
        let gate = VersionGate::new(MismatchBehavior::Error);
        let meta = PackMetadata::default();
        assert!(gate.on_pack_loaded(&event(&meta)).is_ok());
    }
}
