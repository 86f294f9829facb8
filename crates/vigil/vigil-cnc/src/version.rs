//! Protocol version encoding and the compatibility check applied to an
//! observed version.

use crate::error::CncError;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version packed into the 4-byte version field as
/// `major << 16 | minor << 8 | patch`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl SemanticVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Packs the version into the wire value. Never zero unless all three
    /// parts are zero, which the handshake reads as "not initialized".
    pub const fn to_i32(self) -> i32 {
        ((self.major as i32) << 16) | ((self.minor as i32) << 8) | self.patch as i32
    }

    pub const fn from_i32(version: i32) -> Self {
        Self {
            major: (version >> 16) as u8,
            minor: (version >> 8) as u8,
            patch: version as u8,
        }
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid semantic version '{0}', expected major.minor.patch")]
pub struct ParseVersionError(String);

impl FromStr for SemanticVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_string());
        let mut parts = s.trim().split('.').map(str::parse::<u8>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => {
                Ok(Self::new(major, minor, patch))
            }
            _ => Err(invalid()),
        }
    }
}

/// Decides whether an observed, non-zero version is acceptable.
///
/// Implemented for any `Fn(i32) -> Result<(), CncError>`. The error is
/// propagated verbatim to the caller of the handshake operation.
pub trait VersionCheck: Send + Sync {
    fn check(&self, version: i32) -> Result<(), CncError>;
}

impl<F> VersionCheck for F
where
    F: Fn(i32) -> Result<(), CncError> + Send + Sync,
{
    fn check(&self, version: i32) -> Result<(), CncError> {
        self(version)
    }
}

/// Accepts every version.
#[derive(Debug, Default, Copy, Clone)]
pub struct AnyVersion;

impl VersionCheck for AnyVersion {
    fn check(&self, _version: i32) -> Result<(), CncError> {
        Ok(())
    }
}

/// Accepts versions sharing the expected major number.
#[derive(Debug, Copy, Clone)]
pub struct MajorVersionCheck {
    expected: SemanticVersion,
}

impl MajorVersionCheck {
    pub fn new(expected: SemanticVersion) -> Self {
        Self { expected }
    }
}

impl VersionCheck for MajorVersionCheck {
    fn check(&self, version: i32) -> Result<(), CncError> {
        let actual = SemanticVersion::from_i32(version);
        if actual.major != self.expected.major {
            return Err(CncError::IncompatibleVersion {
                expected: self.expected,
                actual,
            });
        }
        Ok(())
    }
}
