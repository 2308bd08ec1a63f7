//! Wall-clock abstraction shared by the store (timestamp stamping) and the countdown.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the server's current time.
///
/// Match timestamps and remaining-time derivations both read from the same clock so that
/// every reader of a persisted `start_time` computes the same remaining value.
pub trait Clock: Send + Sync {
    /// Current wall-clock reading.
    fn now(&self) -> SystemTime;
}

/// Production clock backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Milliseconds since the Unix epoch, as sent to clients in `serverTime` fields.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_counts_from_epoch() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(unix_millis(time), 1_700_000_000_123);
    }

    #[test]
    fn unix_millis_clamps_pre_epoch_times() {
        let time = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(unix_millis(time), 0);
    }
}
