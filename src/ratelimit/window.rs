//! Per-key admission history.

use std::collections::VecDeque;
use std::time::Duration;

/// Timestamps of the admissions still inside one key's trailing window.
///
/// Entries are kept oldest-first. Callers only ever push "now" from a
/// non-decreasing clock, so the deque stays sorted and expired entries are
/// always at the front.
#[derive(Debug, Clone, Default)]
pub struct WindowRecord {
    timestamps: VecDeque<Duration>,
}

impl WindowRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp that has aged out of the window ending at `now`.
    ///
    /// A timestamp exactly `window` old is expired. Only the front of the deque
    /// is inspected, so the cost is proportional to the number of entries
    /// removed. Returns how many were removed.
    pub fn compact(&mut self, now: Duration, window: Duration) -> usize {
        let mut expired = 0;
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_sub(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
            expired += 1;
        }
        expired
    }

    /// Record an admission at `now`.
    pub fn push(&mut self, now: Duration) {
        self.timestamps.push_back(now);
    }

    /// Number of admissions in the record.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the record holds no admissions.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The oldest admission still in the record.
    pub fn oldest(&self) -> Option<Duration> {
        self.timestamps.front().copied()
    }

    /// Time from `now` until the oldest admission leaves the window.
    ///
    /// Zero when the record is empty or the oldest entry is already out.
    pub fn time_until_oldest_expires(&self, now: Duration, window: Duration) -> Duration {
        match self.oldest() {
            Some(oldest) => window.saturating_sub(now.saturating_sub(oldest)),
            None => Duration::ZERO,
        }
    }
}
