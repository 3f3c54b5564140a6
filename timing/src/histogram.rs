//! log-bucketed latency histogram
//!
//! owned by a single thread: samples are recorded once at shutdown, so plain
//! counters are enough. values are microseconds.

use std::fmt;

/// number of buckets, bucket = floor(log2(value))
const NUM_BUCKETS: usize = 64;

/// histogram for summarising request latencies
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: [u64; NUM_BUCKETS],
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            buckets: [0; NUM_BUCKETS],
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    /// records a value in microseconds
    pub fn record(&mut self, value_us: u64) {
        self.buckets[Self::value_to_bucket(value_us)] += 1;
        self.count += 1;
        self.sum = self.sum.saturating_add(value_us);
        self.min = self.min.min(value_us);
        self.max = self.max.max(value_us);
    }

    #[inline(always)]
    fn value_to_bucket(value: u64) -> usize {
        if value == 0 {
            0
        } else {
            (63 - value.leading_zeros() as usize).min(NUM_BUCKETS - 1)
        }
    }

    #[inline(always)]
    fn bucket_to_value(bucket: usize) -> u64 {
        if bucket == 0 {
            0
        } else {
            1u64 << bucket
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn mean(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count
        }
    }

    /// value at percentile `p` (0..=100).
    ///
    /// resolution is one bucket; the result is clamped to the observed min/max.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }

        let target = ((self.count as f64 * p / 100.0).ceil() as u64).max(1);
        let mut cumulative = 0u64;
        for (bucket, &n) in self.buckets.iter().enumerate() {
            cumulative += n;
            if cumulative >= target {
                return Self::bucket_to_value(bucket).clamp(self.min, self.max);
            }
        }
        self.max
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            min: self.min(),
            mean: self.mean(),
            max: self.max(),
            p50: self.percentile(50.0),
            p90: self.percentile(90.0),
            p99: self.percentile(99.0),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// latency statistics in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub mean: u64,
    pub max: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |us: u64| us as f64 / 1000.0;
        write!(
            f,
            "count={} min={:.1}ms mean={:.1}ms max={:.1}ms p50={:.1}ms p90={:.1}ms p99={:.1}ms",
            self.count,
            ms(self.min),
            ms(self.mean),
            ms(self.max),
            ms(self.p50),
            ms(self.p90),
            ms(self.p99)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_basic() {
        let mut hist = Histogram::new();

        for v in [100, 200, 300, 400, 500] {
            hist.record(v);
        }

        assert_eq!(hist.count(), 5);
        assert_eq!(hist.min(), 100);
        assert_eq!(hist.max(), 500);
        assert_eq!(hist.mean(), 300);
    }

    #[test]
    fn test_empty() {
        let hist = Histogram::new();
        assert_eq!(hist.summary(), LatencySummary::default());
    }

    #[test]
    fn test_percentiles() {
        let mut hist = Histogram::new();

        // 1ms..=100ms
        for i in 1..=100 {
            hist.record(i * 1000);
        }

        let p50 = hist.percentile(50.0);
        assert!((32_768..=65_536).contains(&p50));

        let p99 = hist.percentile(99.0);
        assert!(p99 >= 65_536 && p99 <= 100_000);
    }

    #[test]
    fn test_percentile_clamped_to_observed() {
        let mut hist = Histogram::new();
        hist.record(50_000);
        hist.record(50_000);

        assert_eq!(hist.percentile(50.0), 50_000);
        assert_eq!(hist.percentile(99.0), 50_000);
    }

    #[test]
    fn test_bucket_conversion() {
        assert_eq!(Histogram::value_to_bucket(0), 0);
        assert_eq!(Histogram::value_to_bucket(1), 0);
        assert_eq!(Histogram::value_to_bucket(2), 1);
        assert_eq!(Histogram::value_to_bucket(1024), 10);
        assert_eq!(Histogram::value_to_bucket(1_000_000), 19); // ~1s
    }

    #[test]
    fn test_summary_display() {
        let mut hist = Histogram::new();
        hist.record(1500);

        let line = hist.summary().to_string();
        assert!(line.starts_with("count=1 min=1.5ms"));
    }
}
