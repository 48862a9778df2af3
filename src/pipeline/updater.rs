//! Updater stage
//!
//! Single consumer of the results queue. Each verdict is written in its own
//! store transaction and the order is released from the in-flight set
//! whether or not the write succeeded; a failed write is picked up again by
//! the next discovery scan.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::inflight::InFlightSet;
use super::queue::BoundedQueue;
use super::stats::PipelineStats;
use crate::models::Verdict;
use crate::store::OrderStore;

pub struct Updater {
    store: Arc<dyn OrderStore>,
    results: Arc<BoundedQueue<Verdict>>,
    inflight: Arc<InFlightSet>,
    stats: Arc<PipelineStats>,
}

impl Updater {
    pub fn new(
        store: Arc<dyn OrderStore>,
        results: Arc<BoundedQueue<Verdict>>,
        inflight: Arc<InFlightSet>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            results,
            inflight,
            stats,
        }
    }

    /// Drain the results queue until it is closed and empty
    pub async fn run(self) {
        info!("Updater started");
        while let Some(verdict) = self.results.pop().await {
            self.apply(&verdict).await;
        }
        info!("Updater stopped");
    }

    pub async fn apply(&self, verdict: &Verdict) {
        match self.store.apply_verdict(verdict).await {
            Ok(written) => {
                PipelineStats::incr(&self.stats.verdicts_applied);
                debug!(
                    order = %verdict.order,
                    status = %verdict.status,
                    accrual = %verdict.accrual,
                    written,
                    "Verdict applied"
                );
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.update_failures);
                warn!(
                    stage = "updater",
                    order = %verdict.order,
                    error = %e,
                    "Failed to write verdict"
                );
            }
        }
        self.inflight.release(&verdict.order);
    }
}
