//! Semantic API version comparison for the handshake.
//!
//! Major mismatches are hard failures in either direction. A client
//! behind on minor gets a warning but connects; a client *ahead* on
//! minor is asking for features this service does not have, so that is
//! a hard failure too. Patch skew never blocks.

use std::fmt;
use std::str::FromStr;

/// API version the service speaks.
pub const API_VERSION: Version = Version {
    major: 1,
    minor: 4,
    patch: 2,
};

/// Name of the version field inside the handshake request content.
pub const API_HEADER_NAME: &str = "ApiVersion";

/// Outcome of comparing a client version against ours. Derived on every
/// handshake, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    ServiceOutdated,
    ClientOutdated,
    ServiceOutdatedWarning,
    ClientOutdatedWarning,
}

impl Compatibility {
    /// Whether the handshake proceeds under this verdict.
    pub fn connection_allowed(&self) -> bool {
        matches!(
            self,
            Self::Compatible | Self::ServiceOutdatedWarning | Self::ClientOutdatedWarning
        )
    }
}

/// A major.minor.patch triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or(())?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or(())?;
        let patch = parts.next().and_then(|p| p.parse().ok()).ok_or(())?;
        Ok(Version { major, minor, patch })
    }
}

/// Compare a client's version against the service's.
pub fn compatibility(client: Version, service: Version) -> Compatibility {
    if client.major < service.major {
        return Compatibility::ClientOutdated;
    }
    if client.major > service.major {
        return Compatibility::ServiceOutdated;
    }
    if client.minor < service.minor {
        return Compatibility::ClientOutdatedWarning;
    }
    if client.minor > service.minor {
        return Compatibility::ServiceOutdated;
    }
    if client.patch > service.patch {
        return Compatibility::ServiceOutdatedWarning;
    }
    Compatibility::Compatible
}

// ── Tests ──────────────────────────────────────────────────
