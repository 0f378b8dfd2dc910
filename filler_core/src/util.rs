//! Common period helpers.

use std::time::Duration;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Task period from a configured millisecond value.
/// Clamps to at least 1 ms so a zeroed config cannot busy-spin a task.
#[inline]
pub fn period_from_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}
