//! Monotonic tick source for duration math.
//!
//! All elapsed-time computation samples a monotonically increasing tick
//! counter instead of the wall clock, so manual clock changes, NTP slew,
//! and DST transitions never perturb a duration already in flight.

use std::sync::OnceLock;
use std::time::Instant;

/// Tick resolution: one tick per microsecond.
pub const TICKS_PER_SECOND: i64 = 1_000_000;

/// Process-wide anchor for the tick counter.
fn anchor() -> &'static Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now)
}

/// Current monotonic tick count (microseconds since the process anchor).
pub fn timestamp_ticks() -> i64 {
    anchor().elapsed().as_micros() as i64
}

/// Duration in milliseconds between two tick samples.
///
/// Integer (truncating) division: `(end - start) * 1000 / TICKS_PER_SECOND`.
pub fn duration_ms(start_ticks: i64, end_ticks: i64) -> i64 {
    (end_ticks - start_ticks) * 1000 / TICKS_PER_SECOND
}

/// Milliseconds elapsed since `start_ticks`, against a fresh tick sample.
pub fn elapsed_ms(start_ticks: i64) -> i64 {
    duration_ms(start_ticks, timestamp_ticks())
}
