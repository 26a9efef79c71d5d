//! Timestamp and jitter helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, stamped on outbound signals (spec
/// §3) so a receiver can order a short burst of simultaneous messages.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Picks a jittered delay within `[lo, hi]`, used for the post-partner-left
/// re-join delay (spec §5) so two peers that both just failed don't
/// immediately re-match each other.
pub fn jitter(lo: Duration, hi: Duration) -> Duration {
    if hi <= lo {
        return lo;
    }
    let span = (hi - lo).as_millis() as u64;
    let offset = rand::random::<u64>() % (span + 1);
    lo + Duration::from_millis(offset)
}
