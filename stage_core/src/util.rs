//! Common time helpers for stage_core.

use std::time::Duration;

/// Reference poll interval for homing and move monitoring.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Reference wall-clock limit for one homing run.
pub const DEFAULT_HOMING_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval from a millisecond setting, clamped to at least 1 ms so a
/// polling loop always yields between reads.
#[inline]
pub fn poll_interval(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

/// Saturating conversion of a duration to whole milliseconds.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
