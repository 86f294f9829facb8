use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Values are compared across processes, so implementations must follow the
/// shared real-time clock rather than a per-process monotonic one.
pub trait EpochClock: Send + Sync {
    fn time(&self) -> i64;
}

/// Reads `SystemTime` on every call.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemEpochClock;

impl EpochClock for SystemEpochClock {
    #[inline]
    fn time(&self) -> i64 {
        now_ms()
    }
}

/// A clock that only moves when told to.
///
/// Useful for loops that stamp many heartbeats per tick, and for tests.
#[derive(Debug, Default)]
pub struct CachedEpochClock {
    time_ms: AtomicI64,
}

impl CachedEpochClock {
    pub fn new(time_ms: i64) -> Self {
        Self {
            time_ms: AtomicI64::new(time_ms),
        }
    }

    pub fn update(&self, time_ms: i64) {
        self.time_ms.store(time_ms, Ordering::Release);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.time_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl EpochClock for CachedEpochClock {
    #[inline]
    fn time(&self) -> i64 {
        self.time_ms.load(Ordering::Acquire)
    }
}

/// Current wall-clock time in epoch milliseconds; `0` if the system clock is
/// set before 1970.
#[inline]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |t| t.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_clock_moves_only_when_told() {
        let clock = CachedEpochClock::new(1_000);
        assert_eq!(clock.time(), 1_000);
        clock.advance(250);
        assert_eq!(clock.time(), 1_250);
        clock.update(5);
        assert_eq!(clock.time(), 5);
    }

    #[test]
    fn system_clock_is_epoch_millis() {
        let before = now_ms();
        let t = SystemEpochClock.time();
        // 2020-01-01T00:00:00Z
        assert!(t > 1_577_836_800_000);
        assert!(t >= before);
    }
}
