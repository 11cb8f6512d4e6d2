use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ABI version triple. A major bump breaks compatibility, minor and patch do
/// not. Ordering is lexicographic on `(major, minor, patch)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AbiVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version of the ABI this crate implements.
pub const ABI_VERSION: AbiVersion = AbiVersion::new(0, 0, 2);

/// Oldest ABI version this crate can still talk to.
pub const LEAST_ABI_VERSION: AbiVersion = AbiVersion::new(0, 0, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VersionMismatch {
    #[error("plugin ABI version {plugin} is too old for this host (oldest supported: {host_least})")]
    PluginTooOld {
        plugin: AbiVersion,
        host_least: AbiVersion,
    },
    #[error("host ABI version {host} is too old for this plugin (plugin requires: {plugin_least})")]
    HostTooOld {
        host: AbiVersion,
        plugin_least: AbiVersion,
    },
}

/// Checks both directions of compatibility.
///
/// Both conditions are always evaluated; when both fail the plugin-side
/// failure is reported, so the outcome does not depend on which side looks.
pub fn negotiate(
    plugin: AbiVersion,
    plugin_least: AbiVersion,
    host: AbiVersion,
    host_least: AbiVersion,
) -> Result<(), VersionMismatch> {
    let plugin_too_old = plugin < host_least;
    let host_too_old = host < plugin_least;

    if plugin_too_old {
        return Err(VersionMismatch::PluginTooOld { plugin, host_least });
    }
    if host_too_old {
        return Err(VersionMismatch::HostTooOld { host, plugin_least });
    }
    Ok(())
}

/// [`negotiate`] against the versions compiled into this crate.
pub fn check_plugin(plugin: AbiVersion, plugin_least: AbiVersion) -> Result<(), VersionMismatch> {
    negotiate(plugin, plugin_least, ABI_VERSION, LEAST_ABI_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        assert!(AbiVersion::new(0, 9, 9) < AbiVersion::new(1, 0, 0));
        assert!(AbiVersion::new(1, 2, 3) < AbiVersion::new(1, 3, 0));
        assert!(AbiVersion::new(1, 2, 3) < AbiVersion::new(1, 2, 4));
        assert_eq!(AbiVersion::new(1, 2, 3), AbiVersion::new(1, 2, 3));
    }

    #[test]
    fn current_versions_are_compatible() {
        assert!(check_plugin(ABI_VERSION, LEAST_ABI_VERSION).is_ok());
    }

    #[test]
    fn plugin_side_failure_wins_when_both_fail() {
        let result = negotiate(
            AbiVersion::new(0, 0, 1),
            AbiVersion::new(9, 0, 0),
            AbiVersion::new(1, 0, 0),
            AbiVersion::new(0, 1, 0),
        );
        assert!(matches!(result, Err(VersionMismatch::PluginTooOld { .. })));
    }

    #[test]
    fn display_uses_dotted_triple() {
        assert_eq!(AbiVersion::new(0, 0, 2).to_string(), "0.0.2");
    }
}
