use crate::clock::EpochClock;
use std::thread;
use std::time::Duration;

/// Sleep between reads of a control field.
pub const FIELD_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Sleep between checks for the CnC file to appear.
pub const FILE_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Calls `probe` until it yields a value or the deadline passes.
///
/// The deadline is `timeout_ms` after the first clock reading and is checked
/// against the clock before every sleep, so total blocking time does not
/// depend on how long the sleeps actually last. Returns `None` on expiry.
pub fn poll_until<T>(
    clock: &dyn EpochClock,
    timeout_ms: i64,
    interval: Duration,
    probe: impl FnMut() -> Option<T>,
) -> Option<T> {
    let deadline_ms = clock.time().saturating_add(timeout_ms);
    poll_until_deadline(clock, deadline_ms, interval, probe)
}

/// Like [`poll_until`], against an absolute deadline in epoch milliseconds.
/// Consecutive waits sharing one deadline share one time budget.
pub fn poll_until_deadline<T>(
    clock: &dyn EpochClock,
    deadline_ms: i64,
    interval: Duration,
    mut probe: impl FnMut() -> Option<T>,
) -> Option<T> {
    loop {
        if let Some(value) = probe() {
            return Some(value);
        }
        if clock.time() > deadline_ms {
            return None;
        }
        thread::sleep(interval);
    }
}
