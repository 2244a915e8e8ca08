use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raise `cell` to `observed` if it is larger than the current value.
pub fn update_max(cell: &AtomicU64, observed: u64) {
    let mut current = cell.load(Ordering::Relaxed);
    while observed > current {
        match cell.compare_exchange_weak(current, observed, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(next) => current = next,
        }
    }
}

/// Counters describing how a lock gets acquired: how many attempts were
/// made, how many succeeded, how many of those had to block, and the
/// latency of successful acquisitions.
#[derive(Default)]
pub struct AcquisitionStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    successes_contended: AtomicU64,
    failures: AtomicU64,
    total_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
}

impl AcquisitionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one acquisition attempt. `latency_ns` only matters when
    /// `acquired` is true; try-acquires pass zero.
    pub fn sample(&self, acquired: bool, contended: bool, latency_ns: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if acquired {
            self.successes.fetch_add(1, Ordering::Relaxed);
            if contended {
                self.successes_contended.fetch_add(1, Ordering::Relaxed);
            }
            self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
            update_max(&self.max_latency_ns, latency_ns);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn successes_contended(&self) -> u64 {
        self.successes_contended.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn max_latency_ns(&self) -> u64 {
        self.max_latency_ns.load(Ordering::Relaxed)
    }

    pub fn mean_latency_ns(&self) -> u64 {
        let successes = self.successes();
        if successes == 0 {
            return 0;
        }
        self.total_latency_ns.load(Ordering::Relaxed) / successes
    }

    /// Fraction of successful acquisitions that had to block.
    pub fn contention_ratio(&self) -> f64 {
        let successes = self.successes();
        if successes == 0 {
            return 0.0;
        }
        self.successes_contended() as f64 / successes as f64
    }

    pub fn write_report(&self, name: &str, out: &mut String) {
        let _ = writeln!(
            out,
            "Acquisition stats for \"{}\": attempts={} successes={} contended={} failed-tries={}",
            name,
            self.attempts(),
            self.successes(),
            self.successes_contended(),
            self.failures(),
        );
        let _ = writeln!(
            out,
            "  latency mean {} ns, max {} ns",
            self.mean_latency_ns(),
            self.max_latency_ns(),
        );
    }
}

/// Count / running mean / max of a time series, used for hold intervals.
#[derive(Default)]
pub struct BasicStats {
    count: AtomicU64,
    total_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl BasicStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self, value_ns: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(value_ns, Ordering::Relaxed);
        update_max(&self.max_ns, value_ns);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn max_ns(&self) -> u64 {
        self.max_ns.load(Ordering::Relaxed)
    }

    pub fn mean_ns(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        self.total_ns.load(Ordering::Relaxed) / count
    }

    pub fn write_report(&self, name: &str, out: &mut String) {
        let _ = writeln!(
            out,
            "Held stats for \"{}\": count={} mean {} ns, max {} ns",
            name,
            self.count(),
            self.mean_ns(),
            self.max_ns(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_sample_accounting() {
        let stats = AcquisitionStats::new();
        stats.sample(true, false, 100);
        stats.sample(true, true, 300);
        stats.sample(false, true, 0);

        assert_eq!(stats.attempts(), 3);
        assert_eq!(stats.successes(), 2);
        assert_eq!(stats.successes_contended(), 1);
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.mean_latency_ns(), 200);
        assert_eq!(stats.max_latency_ns(), 300);
        assert_eq!(stats.contention_ratio(), 0.5);
    }

    #[test]
    fn empty_stats_have_zero_ratio_and_mean() {
        let stats = AcquisitionStats::new();
        assert_eq!(stats.contention_ratio(), 0.0);
        assert_eq!(stats.mean_latency_ns(), 0);
    }

    #[test]
    fn basic_stats_mean_and_max() {
        let stats = BasicStats::new();
        for v in [10, 20, 60] {
            stats.sample(v);
        }
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.mean_ns(), 30);
        assert_eq!(stats.max_ns(), 60);
    }

    #[test]
    fn update_max_is_monotonic() {
        let cell = AtomicU64::new(0);
        update_max(&cell, 5);
        update_max(&cell, 3);
        update_max(&cell, 9);
        assert_eq!(cell.load(Ordering::Relaxed), 9);
    }
}
