//! Discovery stage
//!
//! Periodically scans the store for orders still waiting for a verdict and
//! claims them into the work queue. An order is claimed in the in-flight set
//! before it is queued, so it is never handed to two requesters at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::inflight::InFlightSet;
use super::queue::BoundedQueue;
use super::stats::PipelineStats;
use crate::store::OrderStore;

pub struct Discovery {
    store: Arc<dyn OrderStore>,
    work: Arc<BoundedQueue<String>>,
    inflight: Arc<InFlightSet>,
    stats: Arc<PipelineStats>,
    interval: Duration,
}

impl Discovery {
    pub fn new(
        store: Arc<dyn OrderStore>,
        work: Arc<BoundedQueue<String>>,
        inflight: Arc<InFlightSet>,
        stats: Arc<PipelineStats>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            work,
            inflight,
            stats,
            interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "Discovery started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Discovery shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let claimed = self.tick().await;
                    if claimed > 0 {
                        debug!(claimed, "Orders queued for accrual");
                    }
                }
            }
        }
    }

    /// One scan. Returns the number of orders claimed and queued.
    pub async fn tick(&self) -> usize {
        let budget = self.work.capacity().saturating_sub(self.inflight.len());
        if budget == 0 {
            PipelineStats::incr(&self.stats.skipped_ticks);
            return 0;
        }

        let exclude = self.inflight.snapshot();
        let numbers = match self.store.find_awaiting_verdict(&exclude, budget).await {
            Ok(numbers) => numbers,
            Err(e) => {
                PipelineStats::incr(&self.stats.discovery_failures);
                warn!(stage = "discovery", error = %e, "Failed to scan awaiting orders");
                return 0;
            }
        };

        let mut claimed = 0;
        for number in numbers {
            if !self.inflight.try_claim(&number) {
                continue;
            }
            if let Err(number) = self.work.try_push(number) {
                // Queue full or closed: leave it for the next scan
                self.inflight.release(&number);
                break;
            }
            claimed += 1;
        }

        PipelineStats::add(&self.stats.discovered, claimed as u64);
        claimed
    }
}
