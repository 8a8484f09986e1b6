//! Inbound RTP loss accounting.
//!
//! A relayed media path has no delivery feedback of its own, so the socket
//! keeps a running estimate from RTP sequence numbers: every forward gap
//! between consecutive observed sequence numbers counts its skipped
//! packets as lost. The estimate is diagnostic, not a per-packet
//! guarantee; reordered packets show up as an anomalous gap and are
//! deliberately not counted.

use std::time::{Duration, Instant};

/// Loss ratio above which a diagnostic warning is due.
const LOSS_RATIO_THRESHOLD: f64 = 0.05;
/// Minimum spacing between diagnostic warnings.
const LOSS_LOG_INTERVAL: Duration = Duration::from_millis(5000);
/// Largest forward sequence jump still counted as loss. A zero gap
/// (duplicate) or anything larger than this is reordering or a stream
/// restart and contributes nothing.
const MAX_SEQUENCE_GAP: u16 = 1000;

/// Counter snapshot emitted when a warning is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossReport {
    pub lost: u64,
    pub received: u64,
}

impl LossReport {
    /// Fraction of packets lost out of everything seen or missed.
    pub fn ratio(&self) -> f64 {
        let total = self.lost + self.received;
        if total == 0 {
            return 0.0;
        }
        self.lost as f64 / total as f64
    }
}

/// Sequence-number loss counters for one socket's inbound path.
///
/// The lost count only grows; there is no reset short of dropping the
/// owning socket.
#[derive(Debug, Default)]
pub struct LossTracker {
    last_seq: Option<u16>,
    lost: u64,
    received: u64,
    last_log: Option<Instant>,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one received RTP sequence number.
    ///
    /// Returns a report when the running loss ratio exceeds the threshold
    /// and enough time has passed since the previous report.
    pub fn record(&mut self, seq: u16, now: Instant) -> Option<LossReport> {
        if let Some(last) = self.last_seq {
            // Wrapping subtraction handles the 16-bit rollover; the
            // in-order successor has gap 1 and contributes no loss.
            let gap = seq.wrapping_sub(last);
            if gap != 0 && gap <= MAX_SEQUENCE_GAP {
                self.lost += u64::from(gap) - 1;
            }
        }
        self.received += 1;
        self.last_seq = Some(seq);

        let report = LossReport {
            lost: self.lost,
            received: self.received,
        };
        if report.ratio() > LOSS_RATIO_THRESHOLD
            && self
                .last_log
                .is_none_or(|at| now.duration_since(at) >= LOSS_LOG_INTERVAL)
        {
            self.last_log = Some(now);
            return Some(report);
        }
        None
    }

    /// Packets counted as lost so far.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Packets received so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_sequence_counts_no_loss() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        for seq in 100..110 {
            tracker.record(seq, now);
        }

        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.received(), 10);
    }

    #[test]
    fn test_gap_counts_skipped_packets() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        tracker.record(0, now);
        tracker.record(5, now);

        assert_eq!(tracker.lost(), 4);
    }

    #[test]
    fn test_wraparound_successor_is_not_a_loss() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        tracker.record(65535, now);
        tracker.record(0, now);

        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.received(), 2);
    }

    #[test]
    fn test_wraparound_gap_counts_loss() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        tracker.record(65534, now);
        tracker.record(2, now);

        // 65535, 0, 1 went missing.
        assert_eq!(tracker.lost(), 3);
    }

    #[test]
    fn test_duplicate_and_reordered_packets_count_no_loss() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        tracker.record(50, now);
        tracker.record(50, now);
        // Backward step reads as a huge wrapped gap and is clamped out.
        tracker.record(49, now);

        assert_eq!(tracker.lost(), 0);
        assert_eq!(tracker.received(), 3);
    }

    #[test]
    fn test_huge_jump_is_clamped_out() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        tracker.record(0, now);
        tracker.record(30000, now);

        assert_eq!(tracker.lost(), 0);
        // Tracking re-syncs at the new position.
        tracker.record(30001, now);
        assert_eq!(tracker.lost(), 0);
    }

    #[test]
    fn test_report_fires_over_threshold_and_throttles() {
        let mut tracker = LossTracker::new();
        let start = Instant::now();

        tracker.record(0, start);
        // Gap of 7: six packets lost, ratio 6/8 -- first crossing reports.
        let first = tracker.record(7, start);
        assert!(first.is_some());

        // Keep the ratio above threshold: 6 lost / 94 received is 6%.
        for seq in 8..100 {
            let report = tracker.record(seq, start);
            assert!(report.is_none(), "throttle must hold within the interval");
        }
        assert_eq!(tracker.lost(), 6);
        assert_eq!(tracker.received(), 94);

        // Still above threshold at the same instant: suppressed.
        assert!(tracker.record(100, start).is_none());

        // Once the interval has elapsed the next packet reports again.
        let later = start + Duration::from_millis(5000);
        let report = tracker.record(101, later).expect("report after interval");
        assert_eq!(report.lost, 6);
        assert_eq!(report.received, 96);
        assert!(report.ratio() > 0.05);
    }

    #[test]
    fn test_no_report_below_threshold() {
        let mut tracker = LossTracker::new();
        let now = Instant::now();

        for seq in 0..50 {
            assert!(tracker.record(seq, now).is_none());
        }
        // One packet lost among a hundred: 1% stays quiet throughout.
        assert!(tracker.record(51, now).is_none());
        for seq in 52..100 {
            assert!(tracker.record(seq, now).is_none());
        }
        assert_eq!(tracker.lost(), 1);
        assert_eq!(tracker.received(), 99);
    }
}
