//! Request statistics served on `/stats`.
//!
//! # Responsibilities
//! - Count successful and failed requests
//! - Estimate latency percentiles in bounded memory
//!
//! # Estimator
//! Latencies are stored in microseconds in a log-linear histogram. Values
//! below 128µs get exact buckets. Above that, every power-of-two range is
//! split into 64 equal sub-buckets, so a bucket is never wider than 1/64 of
//! its lower bound. A reported percentile is the upper bound of the bucket
//! holding the sample of that rank (capped at the largest value seen): it is
//! never below the exact answer and at most ~1.6% above it. Values are
//! clamped at 2^40µs (about 12.7 days). Memory is fixed at 2240 counters.
//!
//! All updates are relaxed atomics; readers may observe a sample in the
//! counters before it shows up in the histogram.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const EXACT_LIMIT: u64 = 128;
const SUB_BUCKET_BITS: u32 = 6;
const SUB_BUCKETS: u64 = 1 << SUB_BUCKET_BITS;
const MIN_MSB: u32 = 7;
const MAX_MSB: u32 = 39;
const MAX_VALUE: u64 = (1 << (MAX_MSB + 1)) - 1;
const NUM_BUCKETS: usize =
    EXACT_LIMIT as usize + ((MAX_MSB - MIN_MSB + 1) as usize) * SUB_BUCKETS as usize;

/// Lock-free, fixed-size latency histogram.
#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: Box<[AtomicU64]>,
    total_us: AtomicU64,
    max_us: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..NUM_BUCKETS).map(|_| AtomicU64::new(0)).collect(),
            total_us: AtomicU64::new(0),
            max_us: AtomicU64::new(0),
        }
    }

    /// Add one sample.
    pub fn record(&self, latency: Duration) {
        let us = u64::try_from(latency.as_micros())
            .unwrap_or(u64::MAX)
            .min(MAX_VALUE);
        self.buckets[bucket_index(us)].fetch_add(1, Ordering::Relaxed);
        self.total_us.fetch_add(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Number of samples recorded.
    pub fn count(&self) -> u64 {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).sum()
    }

    /// Mean of all samples; zero when empty.
    pub fn average(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_us.load(Ordering::Relaxed) / count)
    }

    /// Estimate of the `q` quantile, `q` in `(0, 1]`; zero when empty.
    pub fn percentile(&self, q: f64) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        let rank = ((q.clamp(0.0, 1.0) * count as f64).ceil() as u64).clamp(1, count);
        self.value_at_rank(rank)
    }

    /// Estimate of the smallest sample `v` with at least `pct`% of samples `<= v`.
    fn percent(&self, pct: u64) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        let rank = (count * pct).div_ceil(100).clamp(1, count);
        self.value_at_rank(rank)
    }

    fn value_at_rank(&self, rank: u64) -> Duration {
        let max = self.max_us.load(Ordering::Relaxed);
        let mut seen = 0;
        for (index, bucket) in self.buckets.iter().enumerate() {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= rank {
                return Duration::from_micros(bucket_upper_bound(index).min(max));
            }
        }
        // Buckets were updated while scanning.
        Duration::from_micros(max)
    }
}

fn bucket_index(us: u64) -> usize {
    if us < EXACT_LIMIT {
        return us as usize;
    }
    let msb = 63 - us.leading_zeros();
    let shift = msb - SUB_BUCKET_BITS;
    let sub = (us >> shift) - SUB_BUCKETS;
    EXACT_LIMIT as usize + ((msb - MIN_MSB) as usize) * SUB_BUCKETS as usize + sub as usize
}

fn bucket_upper_bound(index: usize) -> u64 {
    let index = index as u64;
    if index < EXACT_LIMIT {
        return index;
    }
    let offset = index - EXACT_LIMIT;
    let group = offset / SUB_BUCKETS;
    let sub = offset % SUB_BUCKETS + SUB_BUCKETS;
    let shift = group + 1;
    ((sub + 1) << shift) - 1
}

/// Success/error counters plus latency distribution.
#[derive(Debug, Default)]
pub struct Stats {
    success: AtomicU64,
    error: AtomicU64,
    latency: LatencyHistogram,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful request; returns the new total.
    pub fn inc_success(&self) -> u64 {
        self.success.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one failed request; returns the new total.
    pub fn inc_error(&self) -> u64 {
        self.error.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Ingest one latency sample.
    pub fn record(&self, latency: Duration) {
        self.latency.record(latency);
    }

    pub fn success(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn error(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }

    /// `success() + error()`.
    pub fn count(&self) -> u64 {
        self.success() + self.error()
    }

    pub fn average(&self) -> Duration {
        self.latency.average()
    }

    pub fn p99(&self) -> Duration {
        self.latency.percent(99)
    }

    pub fn p95(&self) -> Duration {
        self.latency.percent(95)
    }

    pub fn latency(&self) -> &LatencyHistogram {
        &self.latency
    }

    /// Point-in-time view in the `/stats` wire shape.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            request_count: RequestCount {
                success: self.success(),
                error: self.error(),
            },
            latency_ms: LatencyMs {
                average: self.average().as_millis() as u64,
                p99: self.p99().as_millis() as u64,
            },
        }
    }
}

/// `/stats` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub request_count: RequestCount,
    pub latency_ms: LatencyMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCount {
    pub success: u64,
    pub error: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyMs {
    pub average: u64,
    pub p99: u64,
}
