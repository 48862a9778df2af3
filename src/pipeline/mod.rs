//! Accrual Pipeline
//!
//! Three asynchronous stages connected by bounded queues:
//!
//! ```text
//!   ┌───────────┐  work queue   ┌─────────────┐  results queue  ┌─────────┐
//!   │ Discovery │ ────────────▶ │ Requester×N │ ──────────────▶ │ Updater │
//!   └───────────┘   (numbers)   └─────────────┘    (verdicts)   └─────────┘
//!        │                             │                             │
//!        └──── claim ───▶ InFlightSet ◀── release on failure ────────┘
//!                                            release after write
//! ```
//!
//! An order is in flight from the moment discovery claims it until the
//! updater has attempted to write its verdict (or a requester gave up on it).
//! The in-flight set never holds more than the work queue's capacity.

pub mod discovery;
pub mod inflight;
pub mod queue;
pub mod requester;
pub mod stats;
pub mod updater;


pub use discovery::Discovery;
pub use inflight::InFlightSet;
pub use queue::BoundedQueue;
pub use requester::Requester;
pub use stats::{PipelineStats, PipelineStatsSnapshot};
pub use updater::Updater;

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::accrual::AccrualClient;
use crate::config::PipelineConfig;
use crate::models::Verdict;
use crate::store::OrderStore;

pub struct AccrualPipeline {
    store: Arc<dyn OrderStore>,
    client: Arc<dyn AccrualClient>,
    config: PipelineConfig,
}

impl AccrualPipeline {
    pub fn new(
        store: Arc<dyn OrderStore>,
        client: Arc<dyn AccrualClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Spawn discovery, the requester workers and the updater
    pub fn start(self) -> PipelineHandle {
        let shutdown = CancellationToken::new();
        let work = Arc::new(BoundedQueue::new(self.config.queue_capacity));
        let results = Arc::new(BoundedQueue::new(self.config.result_queue_capacity));
        let inflight = Arc::new(InFlightSet::new());
        let stats = Arc::new(PipelineStats::new());

        let discovery = Discovery::new(
            self.store.clone(),
            work.clone(),
            inflight.clone(),
            stats.clone(),
            self.config.discovery_interval(),
        );
        let discovery = tokio::spawn(discovery.run(shutdown.clone()));

        let requesters = (0..self.config.workers)
            .map(|id| {
                let requester = Requester::new(
                    id,
                    self.client.clone(),
                    work.clone(),
                    results.clone(),
                    inflight.clone(),
                    stats.clone(),
                    &self.config,
                );
                tokio::spawn(requester.run(shutdown.clone()))
            })
            .collect();

        let updater = Updater::new(self.store, results.clone(), inflight.clone(), stats.clone());
        let updater = tokio::spawn(updater.run());

        info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "Accrual pipeline started"
        );

        PipelineHandle {
            shutdown,
            work,
            results,
            inflight,
            stats,
            discovery,
            requesters,
            updater,
        }
    }
}

/// Running pipeline
pub struct PipelineHandle {
    shutdown: CancellationToken,
    work: Arc<BoundedQueue<String>>,
    results: Arc<BoundedQueue<Verdict>>,
    inflight: Arc<InFlightSet>,
    stats: Arc<PipelineStats>,
    discovery: JoinHandle<()>,
    requesters: Vec<JoinHandle<()>>,
    updater: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn inflight(&self) -> &Arc<InFlightSet> {
        &self.inflight
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop every stage.
    ///
    /// In-progress requests finish and their verdicts are still written;
    /// orders left in the work queue are released untouched and picked up on
    /// the next start.
    pub async fn shutdown(self) -> PipelineStatsSnapshot {
        info!("Accrual pipeline shutting down");
        self.shutdown.cancel();
        self.work.close();

        if let Err(e) = self.discovery.await {
            error!(error = %e, "Discovery task failed");
        }
        for result in join_all(self.requesters).await {
            if let Err(e) = result {
                error!(error = %e, "Requester task failed");
            }
        }

        while let Some(number) = self.work.try_pop() {
            self.inflight.release(&number);
        }

        self.results.close();
        if let Err(e) = self.updater.await {
            error!(error = %e, "Updater task failed");
        }

        let snapshot = self.stats.snapshot();
        info!("{}", snapshot);
        snapshot
    }
}
