use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default lower bound for promoted histograms: anything under a
/// microsecond is noise for a user-space lock.
pub const DEFAULT_HISTO_MIN_VALUE_NS: u64 = 1_000;

/// Default span of promoted histograms, in powers of ten above the minimum.
pub const DEFAULT_HISTO_DECADES: u32 = 7;

const BINS_PER_DECADE: usize = 10;

/// Logarithmic latency histogram: `decades` powers of ten starting at
/// `min_value_ns`, each split into ten linear bins. Samples below the
/// minimum land in a dedicated underflow bucket; samples above the top
/// decade clamp into the last bin.
pub struct Histogram {
    min_value_ns: u64,
    decades: u32,
    underflow: AtomicU64,
    buckets: Vec<AtomicU64>,
    total_samples: AtomicU64,
}

impl Histogram {
    pub fn new(min_value_ns: u64, decades: u32) -> Self {
        let min_value_ns = min_value_ns.max(1);
        let decades = decades.max(1);
        tracing::debug!(min_value_ns, decades, "building latency histogram");
        Self {
            min_value_ns,
            decades,
            underflow: AtomicU64::new(0),
            buckets: (0..decades as usize * BINS_PER_DECADE)
                .map(|_| AtomicU64::new(0))
                .collect(),
            total_samples: AtomicU64::new(0),
        }
    }

    pub fn min_value_ns(&self) -> u64 {
        self.min_value_ns
    }

    pub fn decades(&self) -> u32 {
        self.decades
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    pub fn underflow(&self) -> u64 {
        self.underflow.load(Ordering::Relaxed)
    }

    pub fn sample(&self, value_ns: u64) {
        self.total_samples.fetch_add(1, Ordering::Relaxed);
        if value_ns < self.min_value_ns {
            self.underflow.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let index = self.bucket_index(value_ns);
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn bucket_count(&self, index: usize) -> u64 {
        self.buckets[index].load(Ordering::Relaxed)
    }

    fn bucket_index(&self, value_ns: u64) -> usize {
        let mut lo = self.min_value_ns;
        for decade in 0..self.decades as usize {
            let hi = lo.saturating_mul(10);
            if value_ns < hi || hi == lo {
                let step = ((hi - lo) / BINS_PER_DECADE as u64).max(1);
                let offset = ((value_ns - lo) / step) as usize;
                return decade * BINS_PER_DECADE + offset.min(BINS_PER_DECADE - 1);
            }
            lo = hi;
        }
        // above the top decade: clamp
        self.buckets.len() - 1
    }

    fn bucket_bounds(&self, index: usize) -> (u64, u64) {
        let decade = index / BINS_PER_DECADE;
        let bin = index % BINS_PER_DECADE;
        let lo = self.min_value_ns.saturating_mul(10u64.saturating_pow(decade as u32));
        let hi = lo.saturating_mul(10);
        let step = ((hi - lo) / BINS_PER_DECADE as u64).max(1);
        let start = lo + step * bin as u64;
        let end = if bin == BINS_PER_DECADE - 1 { hi } else { start + step };
        (start, end)
    }

    /// Append a human-readable rendering; empty bins are skipped.
    pub fn write_report(&self, label: &str, out: &mut String) {
        let _ = writeln!(
            out,
            "Histogram ({}): min {} ns, {} decades, {} samples, {} underflow",
            label,
            self.min_value_ns,
            self.decades,
            self.total_samples(),
            self.underflow(),
        );
        for index in 0..self.buckets.len() {
            let count = self.bucket_count(index);
            if count == 0 {
                continue;
            }
            let (start, end) = self.bucket_bounds(index);
            let _ = writeln!(out, "  [{start} ns, {end} ns) {count}");
        }
    }
}
