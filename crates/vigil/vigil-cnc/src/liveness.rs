//! The active-versus-stale decision and the bounded waits behind it.
//!
//! A region is active when the owner has published a version, has written at
//! least one heartbeat, the version passes the configured check and the
//! heartbeat is at most `timeout_ms` old. A heartbeat from the future (the
//! owner's clock runs ahead) counts as fresh so that clock skew never turns a
//! live owner into a dead one.

use crate::buffer::AtomicBuffer;
use crate::error::CncError;
use crate::fields::ControlFields;
use crate::handshake::Handshake;
use crate::layout::ControlLayout;
use crate::poll::{FIELD_POLL_INTERVAL, poll_until_deadline};

/// Age of a heartbeat read from shared memory. Saturates so that a garbage
/// timestamp far in the past reads as stale rather than overflowing.
#[inline]
pub fn heartbeat_age(now_ms: i64, timestamp_ms: i64) -> i64 {
    now_ms.saturating_sub(timestamp_ms)
}

/// Whether a heartbeat of the given age keeps an owner alive.
#[inline]
pub(crate) fn heartbeat_is_fresh(age_ms: i64, timeout_ms: i64) -> bool {
    age_ms <= timeout_ms
}

/// Whether a heartbeat of the given age blocks adopting the file. Stricter
/// than [`heartbeat_is_fresh`]: an age equal to the timeout may be adopted.
#[inline]
pub(crate) fn heartbeat_blocks_adoption(age_ms: i64, timeout_ms: i64) -> bool {
    age_ms < timeout_ms
}

impl Handshake {
    /// Waits until the version field is non-zero and returns it.
    ///
    /// Fails with [`CncError::NotInitialized`] once `timeout_ms` has elapsed
    /// on the handshake clock.
    pub fn await_initialized(&self, buffer: &AtomicBuffer, timeout_ms: i64) -> Result<i32, CncError> {
        self.layout.check(buffer)?;
        self.await_version(ControlFields::new(buffer, self.layout), self.deadline_ms(timeout_ms))
    }

    /// Waits until the timestamp field is non-zero and returns it.
    ///
    /// Fails with [`CncError::NoHeartbeat`] once `timeout_ms` has elapsed.
    pub fn await_heartbeat(&self, buffer: &AtomicBuffer, timeout_ms: i64) -> Result<i64, CncError> {
        self.layout.check(buffer)?;
        self.await_timestamp(ControlFields::new(buffer, self.layout), self.deadline_ms(timeout_ms))
    }

    /// Decides whether an owner is currently alive.
    ///
    /// `None` is never active and returns immediately. Otherwise this blocks
    /// for up to the timeout, shared by both waits, while the version and the
    /// first heartbeat are still zero, and propagates those timeouts as well as any version check
    /// failure.
    pub fn is_active(&self, buffer: Option<&AtomicBuffer>) -> Result<bool, CncError> {
        match buffer {
            None => Ok(false),
            Some(buffer) => {
                self.layout.check(buffer)?;
                self.is_active_with(buffer, self.layout)
            }
        }
    }

    pub(crate) fn is_active_with(
        &self,
        buffer: &AtomicBuffer,
        layout: ControlLayout,
    ) -> Result<bool, CncError> {
        let fields = ControlFields::new(buffer, layout);

        let deadline_ms = self.deadline_ms(self.timeout_ms);
        let version = self.await_version(fields, deadline_ms)?;
        let timestamp = self.await_timestamp(fields, deadline_ms)?;
        self.version_check.check(version)?;

        let age_ms = heartbeat_age(self.clock.time(), timestamp);
        self.log(|| format!("heartbeat age is {age_ms} ms"));
        tracing::debug!(version, age_ms, timeout_ms = self.timeout_ms, "evaluated cnc liveness");

        Ok(heartbeat_is_fresh(age_ms, self.timeout_ms))
    }

    pub(crate) fn await_version(
        &self,
        fields: ControlFields<'_>,
        deadline_ms: i64,
    ) -> Result<i32, CncError> {
        poll_until_deadline(self.clock.as_ref(), deadline_ms, FIELD_POLL_INTERVAL, || {
            let version = fields.read_version_acquire();
            (version != 0).then_some(version)
        })
        .ok_or(CncError::NotInitialized)
    }

    pub(crate) fn await_timestamp(
        &self,
        fields: ControlFields<'_>,
        deadline_ms: i64,
    ) -> Result<i64, CncError> {
        poll_until_deadline(self.clock.as_ref(), deadline_ms, FIELD_POLL_INTERVAL, || {
            let timestamp = fields.read_timestamp_acquire();
            (timestamp != 0).then_some(timestamp)
        })
        .ok_or(CncError::NoHeartbeat)
    }
}
