use crate::stats::AcquisitionStats;

/// Contention ratio above which a lock is considered hot and worth the
/// cost of full latency histograms.
pub const HOT_RATIO: f64 = 0.20;

/// Contention ratio above which a hot lock also deserves an advisory log
/// line.
pub const LOG_RATIO: f64 = 0.40;

/// Ignore locks with fewer attempts than this; a couple of collisions
/// during startup is not a trend.
const MIN_ATTEMPTS: u64 = 10;

/// What the kitchen thinks of a lock's acquisition history.
#[derive(Debug, Clone, Copy)]
pub struct Verdict {
    pub contention_ratio: f64,
    pub is_hot: bool,
    pub do_log: bool,
}

/// Evaluate acquisition statistics and decide whether the lock has gone
/// hot. Called from the diagnostic dump path, never from acquire/release.
pub fn kitchen(stats: &AcquisitionStats) -> Verdict {
    let contention_ratio = stats.contention_ratio();
    if stats.attempts() < MIN_ATTEMPTS {
        return Verdict {
            contention_ratio,
            is_hot: false,
            do_log: false,
        };
    }
    Verdict {
        contention_ratio,
        is_hot: contention_ratio > HOT_RATIO,
        do_log: contention_ratio > LOG_RATIO,
    }
}
