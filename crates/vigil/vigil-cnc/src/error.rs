use crate::version::SemanticVersion;
use std::io;
use std::path::PathBuf;

/// Every failure the handshake can report.
///
/// Nothing is logged and swallowed: each variant surfaces at the call that
/// failed.
#[derive(Debug, thiserror::Error)]
pub enum CncError {
    #[error(
        "version field at offset {version_offset} must precede the timestamp field at offset {timestamp_offset}"
    )]
    InvalidOffsets {
        version_offset: usize,
        timestamp_offset: usize,
    },

    #[error("{field} field at offset {offset} is not {align}-byte aligned")]
    Misaligned {
        field: &'static str,
        offset: usize,
        align: usize,
    },

    #[error("region of {len} bytes cannot hold control fields ending at byte {required}")]
    RegionTooSmall { len: usize, required: usize },

    #[error("cnc file not found: '{}'", path.display())]
    FileNotFound { path: PathBuf },

    #[error("cnc file is created but not initialised")]
    NotInitialized,

    #[error("no non-zero heartbeat timestamp detected")]
    NoHeartbeat,

    #[error("active cnc file detected: '{}'", path.display())]
    ActiveOwner { path: PathBuf },

    #[error("incompatible cnc version {actual}, expected {expected}")]
    IncompatibleVersion {
        expected: SemanticVersion,
        actual: SemanticVersion,
    },

    #[error("cnc version {version} rejected: {reason}")]
    VersionRejected { version: i32, reason: String },

    #[error("failed to {context} '{}'", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cnc file is closed")]
    Closed,
}

impl CncError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Invalid layout or a region that cannot hold it. Never worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidOffsets { .. } | Self::Misaligned { .. } | Self::RegionTooSmall { .. }
        )
    }

    /// A deadline expired while waiting for the file, the version or the heartbeat.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. } | Self::NotInitialized | Self::NoHeartbeat
        )
    }

    /// A live owner already holds the region.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ActiveOwner { .. })
    }

    /// The version check refused the observed version.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleVersion { .. } | Self::VersionRejected { .. }
        )
    }
}
