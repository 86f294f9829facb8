use crate::clock::{EpochClock, SystemEpochClock};
use crate::layout::ControlLayout;
use crate::logger::Logger;
use crate::version::{AnyVersion, VersionCheck};
use std::fmt;
use std::sync::Arc;

/// Default liveness timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i64 = 10_000;

/// Everything a process needs to create, adopt or watch a CnC region.
///
/// Holds the control layout, the liveness timeout, the clock, the version
/// check and the optional logger. The liveness evaluator and the lifecycle
/// strategies are methods on this type.
///
/// # Example
/// ```no_run
/// use vigil_cnc::{ControlLayout, Handshake, MajorVersionCheck, SemanticVersion};
///
/// let version = SemanticVersion::new(1, 0, 0);
/// let handshake = Handshake::new(ControlLayout::new(0, 8)?)
///     .timeout_ms(1_000)
///     .version_check(MajorVersionCheck::new(version));
///
/// let cnc = handshake.create_in_directory("/dev/shm/vigil", "cnc.dat", 4096, false)?;
/// cnc.signal_ready(version.to_i32())?;
/// # Ok::<(), vigil_cnc::CncError>(())
/// ```
#[derive(Clone)]
pub struct Handshake {
    pub(crate) layout: ControlLayout,
    pub(crate) timeout_ms: i64,
    pub(crate) clock: Arc<dyn EpochClock>,
    pub(crate) version_check: Arc<dyn VersionCheck>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) warn_if_directory_exists: bool,
}

impl Handshake {
    pub fn new(layout: ControlLayout) -> Self {
        Self {
            layout,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            clock: Arc::new(SystemEpochClock),
            version_check: Arc::new(AnyVersion),
            logger: None,
            warn_if_directory_exists: false,
        }
    }

    /// Heartbeat age beyond which an owner counts as dead. Also bounds every
    /// wait performed by the discovery strategies.
    pub fn timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn clock(mut self, clock: impl EpochClock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Shares a clock the caller keeps a handle on.
    pub fn shared_clock(mut self, clock: Arc<dyn EpochClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn version_check(mut self, check: impl VersionCheck + 'static) -> Self {
        self.version_check = Arc::new(check);
        self
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Report an already existing CnC directory through the logger when
    /// creating a fresh one.
    pub fn warn_if_directory_exists(mut self, warn: bool) -> Self {
        self.warn_if_directory_exists = warn;
        self
    }

    #[inline]
    pub fn layout(&self) -> ControlLayout {
        self.layout
    }

    #[inline]
    pub fn timeout(&self) -> i64 {
        self.timeout_ms
    }

    /// Current time according to the configured clock.
    #[inline]
    pub fn now_ms(&self) -> i64 {
        self.clock.time()
    }

    /// Absolute deadline `timeout_ms` from now on the configured clock.
    pub(crate) fn deadline_ms(&self, timeout_ms: i64) -> i64 {
        self.clock.time().saturating_add(timeout_ms)
    }

    pub(crate) fn log(&self, message: impl FnOnce() -> String) {
        if let Some(logger) = &self.logger {
            logger.log(&message());
        }
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("layout", &self.layout)
            .field("timeout_ms", &self.timeout_ms)
            .field("logger", &self.logger.is_some())
            .field("warn_if_directory_exists", &self.warn_if_directory_exists)
            .finish_non_exhaustive()
    }
}
