//! Requester stage
//!
//! Workers pop claimed order numbers, ask the scoring service for a verdict
//! and forward it to the updater. Failed attempts release the claim so a
//! later discovery scan retries the order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::inflight::InFlightSet;
use super::queue::BoundedQueue;
use super::stats::PipelineStats;
use crate::accrual::{AccrualClient, AccrualError};
use crate::config::PipelineConfig;
use crate::models::Verdict;

pub struct Requester {
    id: usize,
    client: Arc<dyn AccrualClient>,
    work: Arc<BoundedQueue<String>>,
    results: Arc<BoundedQueue<Verdict>>,
    inflight: Arc<InFlightSet>,
    stats: Arc<PipelineStats>,
    max_retry_after: Duration,
}

impl Requester {
    pub fn new(
        id: usize,
        client: Arc<dyn AccrualClient>,
        work: Arc<BoundedQueue<String>>,
        results: Arc<BoundedQueue<Verdict>>,
        inflight: Arc<InFlightSet>,
        stats: Arc<PipelineStats>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            id,
            client,
            work,
            results,
            inflight,
            stats,
            max_retry_after: config.max_retry_after(),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        debug!(worker = self.id, "Requester started");

        loop {
            let number = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.work.pop() => match next {
                    Some(number) => number,
                    None => break,
                },
            };

            if let Some(pause) = self.process(&number).await {
                info!(
                    worker = self.id,
                    pause_ms = pause.as_millis() as u64,
                    "Accrual service rate limit, pausing"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        debug!(worker = self.id, "Requester stopped");
    }

    /// Handle one order. Returns how long to pause when rate limited.
    pub async fn process(&self, number: &str) -> Option<Duration> {
        PipelineStats::incr(&self.stats.requested);

        match self.client.fetch_verdict(number).await {
            Ok(verdict) => {
                if self.results.push(verdict).await.is_err() {
                    // Updater is gone, the verdict is refetched after restart
                    self.inflight.release(number);
                }
                None
            }
            Err(AccrualError::RateLimited { retry_after }) => {
                PipelineStats::incr(&self.stats.rate_limited);
                self.inflight.release(number);
                Some(retry_after.min(self.max_retry_after))
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.request_failures);
                warn!(stage = "requester", order = number, error = %e, "Accrual request failed");
                self.inflight.release(number);
                None
            }
        }
    }
}
