//! Core sliding-window limiter implementation.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::window::WindowRecord;
use crate::config::LimiterConfig;
use crate::error::{Result, SlidegateError};

/// Outcome of a single admission attempt.
///
/// Every field is computed from the same snapshot of the key's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request was admitted and recorded
    pub allowed: bool,
    /// Admissions still available in the current window after this one
    pub remaining: usize,
    /// How long until the next request for this key could be admitted
    pub retry_after: Duration,
}

/// A per-key sliding-window rate limiter.
///
/// Each key may be admitted at most `max_requests` times in any trailing
/// window of `window_size`. Keys are tracked independently.
///
/// Expired admissions are dropped lazily when their key is next touched;
/// there is no background sweep. A key nobody asks about again keeps its
/// stale record until the next touch or [`clear`](Self::clear).
///
/// This struct is thread-safe and can be shared across threads behind an
/// `Arc`. Operations on the same key are serialized; operations on
/// different keys only contend when they land on the same map shard.
pub struct SlidingWindowLimiter<K, C = SystemClock>
where
    K: Eq + Hash,
{
    /// Admission history indexed by key
    windows: DashMap<K, WindowRecord>,
    /// Length of the trailing window
    window_size: Duration,
    /// Admissions allowed per window
    max_requests: usize,
    /// Source of "now" for every operation
    clock: C,
}

impl<K> SlidingWindowLimiter<K, SystemClock>
where
    K: Eq + Hash,
{
    /// Create a limiter driven by the system clock.
    ///
    /// Fails if `window_size` is zero. A `max_requests` of zero is accepted
    /// and denies every request.
    pub fn new(window_size: Duration, max_requests: usize) -> Result<Self> {
        Self::with_clock(window_size, max_requests, SystemClock)
    }
}

impl<K, C> SlidingWindowLimiter<K, C>
where
    K: Eq + Hash,
    C: Clock,
{
    /// Create a limiter that reads time from `clock`.
    pub fn with_clock(window_size: Duration, max_requests: usize, clock: C) -> Result<Self> {
        if window_size.is_zero() {
            return Err(SlidegateError::InvalidWindow(
                "window size must be greater than zero".to_string(),
            ));
        }

        info!(
            window = ?window_size,
            max_requests = max_requests,
            "Creating sliding window limiter"
        );

        Ok(Self {
            windows: DashMap::new(),
            window_size,
            max_requests,
            clock,
        })
    }

    /// Create a limiter from the `limiter` section of the configuration.
    pub fn from_config(config: &LimiterConfig, clock: C) -> Result<Self> {
        Self::with_clock(config.window()?, config.max_requests, clock)
    }

    /// Check whether a request for `key` would be admitted right now.
    ///
    /// Expired admissions are purged, but nothing is recorded.
    pub fn is_allowed<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let allowed = self.request_count(key) < self.max_requests;
        trace!(key = ?key, allowed = allowed, "Checked sliding window");
        allowed
    }

    /// Admit and record a request for `key` if the window has room.
    ///
    /// Returns `true` if the request was counted, `false` if the key is at
    /// capacity. A denied request leaves the key's history untouched.
    pub fn try_admit<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + fmt::Debug + ?Sized,
    {
        self.admit(key).allowed
    }

    /// Admit and record a request for `key`, reporting the resulting status.
    ///
    /// The capacity check and the append happen under the key's exclusive
    /// lock, so concurrent callers can never commit more than `max_requests`
    /// admissions inside one window.
    pub fn admit<Q>(&self, key: &Q) -> Admission
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + fmt::Debug + ?Sized,
    {
        if self.max_requests == 0 {
            debug!(key = ?key, "Rate limit exceeded, limiter admits nothing");
            return Admission {
                allowed: false,
                remaining: 0,
                retry_after: Duration::ZERO,
            };
        }

        let now = self.clock.now();

        // Look up first so that known keys skip allocating an owned key.
        let existing = self.windows.get_mut(key);
        let admission = match existing {
            Some(mut record) => self.decide(key, &mut record, now),
            None => {
                let mut record = self.windows.entry(key.to_owned()).or_default();
                self.decide(key, &mut record, now)
            }
        };

        if admission.allowed {
            trace!(
                key = ?key,
                remaining = admission.remaining,
                "Request admitted"
            );
        } else {
            debug!(
                key = ?key,
                retry_after = ?admission.retry_after,
                "Rate limit exceeded"
            );
        }

        admission
    }

    /// How long until a request for `key` could be admitted.
    ///
    /// Zero when the key has room now. This is advisory only: nothing is
    /// reserved, and another caller may take the slot first.
    pub fn time_until_allowed<Q>(&self, key: &Q) -> Duration
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let now = self.clock.now();
        let wait = self
            .observe(key, now, |record| {
                if record.len() < self.max_requests {
                    Duration::ZERO
                } else {
                    record.time_until_oldest_expires(now, self.window_size)
                }
            })
            .unwrap_or(Duration::ZERO);

        trace!(key = ?key, wait = ?wait, "Computed time until allowed");
        wait
    }

    /// Number of admissions for `key` inside the current window.
    pub fn request_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let now = self.clock.now();
        let count = self.observe(key, now, WindowRecord::len).unwrap_or(0);
        trace!(key = ?key, count = count, "Counted sliding window");
        count
    }

    /// Admissions still available for `key` in the current window.
    pub fn remaining<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.max_requests.saturating_sub(self.request_count(key))
    }

    /// Number of keys currently holding a record.
    ///
    /// Keys whose admissions have all expired are still counted until they
    /// are next touched.
    pub fn active_keys(&self) -> usize {
        self.windows.len()
    }

    /// Forget every key's history.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Length of the trailing window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Admissions allowed per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// The limiter's time source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Compact the key's record, then decide and record under the same lock.
    fn decide<Q>(&self, key: &Q, record: &mut WindowRecord, now: Duration) -> Admission
    where
        Q: fmt::Debug + ?Sized,
    {
        let expired = record.compact(now, self.window_size);
        if expired > 0 {
            trace!(key = ?key, expired = expired, "Compacted sliding window");
        }

        let allowed = record.len() < self.max_requests;
        if allowed {
            record.push(now);
        }

        let retry_after = if record.len() < self.max_requests {
            Duration::ZERO
        } else {
            record.time_until_oldest_expires(now, self.window_size)
        };

        Admission {
            allowed,
            remaining: self.max_requests.saturating_sub(record.len()),
            retry_after,
        }
    }

    /// Compact the key's record and inspect it.
    ///
    /// Returns `None` for keys without a record. A record emptied by
    /// compaction is removed from the map once the shard lock is released.
    fn observe<Q, T>(
        &self,
        key: &Q,
        now: Duration,
        inspect: impl FnOnce(&WindowRecord) -> T,
    ) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let (result, emptied) = {
            let mut record = self.windows.get_mut(key)?;
            let expired = record.compact(now, self.window_size);
            if expired > 0 {
                trace!(key = ?key, expired = expired, "Compacted sliding window");
            }
            (inspect(&*record), record.is_empty())
        };

        if emptied {
            self.reclaim(key);
        }

        Some(result)
    }

    /// Remove the key if its record is still empty.
    ///
    /// Re-checked under the lock: an admission that raced in between keeps
    /// the key alive.
    fn reclaim<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        if self
            .windows
            .remove_if(key, |_, record| record.is_empty())
            .is_some()
        {
            debug!(key = ?key, "Reclaimed idle key");
        }
    }
}
