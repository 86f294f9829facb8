//! Cross-process liveness handshake over a memory-mapped command-and-control
//! (CnC) file.
//!
//! An owner process publishes a protocol version and keeps a heartbeat
//! timestamp fresh inside a shared region. Watchers map the same file to
//! learn whether the owner is alive and speaks a compatible version. The two
//! control fields use release stores and acquire loads; that pairing is the
//! only synchronisation between the processes.

mod buffer;
mod clock;
mod cnc_file;
mod error;
mod fields;
mod handshake;
mod layout;
mod lifecycle;
mod liveness;
mod logger;
mod poll;
mod version;

pub use buffer::AtomicBuffer;
pub use clock::{CachedEpochClock, EpochClock, SystemEpochClock, now_ms};
pub use cnc_file::CncFile;
pub use error::CncError;
pub use fields::ControlFields;
pub use handshake::{DEFAULT_TIMEOUT_MS, Handshake};
pub use liveness::heartbeat_age;
pub use layout::{ControlLayout, SIZE_OF_TIMESTAMP, SIZE_OF_VERSION};
pub use logger::{Logger, TracingLogger};
pub use poll::{FIELD_POLL_INTERVAL, FILE_POLL_INTERVAL, poll_until, poll_until_deadline};
pub use version::{AnyVersion, MajorVersionCheck, ParseVersionError, SemanticVersion, VersionCheck};
pub use vigil_mmap::MmapFileMut;
