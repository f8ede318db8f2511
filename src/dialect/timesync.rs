//! Remote-to-local timestamp synchronization
//!
//! Scanner clocks drift and are rarely set to the receiver's time. The
//! synchronizer estimates the offset between the two clocks as the mean of
//! (local - remote) over a bounded sliding window and re-stamps incoming
//! messages into locally comparable time.

use crate::protocol::header::Timestamp;
use std::collections::VecDeque;

/// Sliding window size, in accepted samples
pub const SYNC_WINDOW: usize = 20;

/// Sliding-window clock offset estimator
///
/// Samples are accepted into the window unconditionally: no outlier
/// rejection. A sample whose remote timestamp equals the previous one is
/// ignored entirely, so the estimate lags a clock change by one cycle when
/// the sender repeats timestamps. This is the carried-over behavior of the
/// original averaging scheme, kept as-is.
#[derive(Debug)]
pub struct TimestampSynchronizer {
    deltas: VecDeque<f64>,
    last_remote: Option<u64>,
    shift: f64,
}

impl TimestampSynchronizer {
    pub fn new() -> Self {
        TimestampSynchronizer {
            deltas: VecDeque::with_capacity(SYNC_WINDOW),
            last_remote: None,
            shift: 0.0,
        }
    }

    /// Feed one (remote, local) millisecond pair
    pub fn sample(&mut self, remote_ms: u64, local_ms: u64) {
        if self.last_remote == Some(remote_ms) {
            return;
        }
        self.last_remote = Some(remote_ms);

        if self.deltas.len() == SYNC_WINDOW {
            self.deltas.pop_front();
        }
        self.deltas.push_back(local_ms as f64 - remote_ms as f64);

        self.shift = self.deltas.iter().sum::<f64>() / self.deltas.len() as f64;
    }

    /// Feed a remote timestamp against the current system clock
    pub fn sample_now(&mut self, remote_ms: u64) {
        let local_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.sample(remote_ms, local_ms);
    }

    /// Current offset estimate: local clock minus remote clock, milliseconds
    pub fn shift_ms(&self) -> f64 {
        self.shift
    }

    /// Number of samples currently in the window
    pub fn sample_count(&self) -> usize {
        self.deltas.len()
    }

    /// Re-stamp a remote timestamp into local time
    pub fn to_local(&self, remote: Timestamp) -> Timestamp {
        let shifted = remote.to_millis() as f64 + self.shift;
        Timestamp::from_millis(shifted.max(0.0) as u64)
    }
}

impl Default for TimestampSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_to_constant_offset() {
        let mut sync = TimestampSynchronizer::new();

        // Remote clock 10000 ms behind local
        let delta = 10_000u64;
        for i in 0..30u64 {
            let remote = 1_000_000 + i * 33;
            sync.sample(remote, remote + delta);
        }

        assert!((sync.shift_ms() - delta as f64).abs() <= 10.0);
    }

    #[test]
    fn test_reconverges_to_new_offset() {
        let mut sync = TimestampSynchronizer::new();

        for i in 0..30u64 {
            let remote = 1_000_000 + i * 33;
            sync.sample(remote, remote + 10_000);
        }
        assert!((sync.shift_ms() - 10_000.0).abs() <= 10.0);

        // Sender clock steps; feed enough samples to flush the window
        for i in 30..30 + 2 * SYNC_WINDOW as u64 {
            let remote = 1_000_000 + i * 33;
            sync.sample(remote, remote + 1_000);
        }
        assert!((sync.shift_ms() - 1_000.0).abs() <= 20.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut sync = TimestampSynchronizer::new();
        for i in 0..100u64 {
            sync.sample(i * 10, i * 10 + 500);
        }
        assert_eq!(sync.sample_count(), SYNC_WINDOW);
    }

    #[test]
    fn test_repeated_remote_timestamp_ignored() {
        let mut sync = TimestampSynchronizer::new();

        sync.sample(1000, 2000);
        assert_eq!(sync.shift_ms(), 1000.0);

        // Same remote stamp with a different local time: no update
        sync.sample(1000, 9000);
        assert_eq!(sync.shift_ms(), 1000.0);
        assert_eq!(sync.sample_count(), 1);
    }

    #[test]
    fn test_restamping() {
        let mut sync = TimestampSynchronizer::new();
        for i in 0..25u64 {
            let remote = 5_000 + i * 40;
            sync.sample(remote, remote + 2_000);
        }

        let remote = Timestamp::from_millis(6_000);
        let local = sync.to_local(remote);
        assert!(local.to_millis().abs_diff(8_000) <= 1);
    }
}
