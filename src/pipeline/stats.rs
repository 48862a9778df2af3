use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every pipeline stage
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Order numbers pushed onto the work queue by discovery
    pub discovered: AtomicU64,
    /// Discovery ticks skipped because no capacity was left
    pub skipped_ticks: AtomicU64,
    /// Discovery queries that failed
    pub discovery_failures: AtomicU64,
    /// Calls made to the accrual service
    pub requested: AtomicU64,
    /// Calls that produced no verdict (network, decode, 204)
    pub request_failures: AtomicU64,
    /// 429 responses
    pub rate_limited: AtomicU64,
    /// Verdicts written successfully
    pub verdicts_applied: AtomicU64,
    /// Verdict writes that failed and were rolled back
    pub update_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            discovery_failures: self.discovery_failures.load(Ordering::Relaxed),
            requested: self.requested.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            verdicts_applied: self.verdicts_applied.load(Ordering::Relaxed),
            update_failures: self.update_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub discovered: u64,
    pub skipped_ticks: u64,
    pub discovery_failures: u64,
    pub requested: u64,
    pub request_failures: u64,
    pub rate_limited: u64,
    pub verdicts_applied: u64,
    pub update_failures: u64,
}

impl std::fmt::Display for PipelineStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline Stats: discovered={} (skipped_ticks={}, failures={}), requested={} (failed={}, rate_limited={}), applied={} (failed={})",
            self.discovered,
            self.skipped_ticks,
            self.discovery_failures,
            self.requested,
            self.request_failures,
            self.rate_limited,
            self.verdicts_applied,
            self.update_failures
        )
    }
}
