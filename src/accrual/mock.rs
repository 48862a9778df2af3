//! Scripted accrual client for pipeline tests

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{AccrualClient, AccrualError};
use crate::models::{OrderStatus, Verdict};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    Verdict(OrderStatus, Decimal),
    NotRegistered,
    Malformed,
    RateLimited(Duration),
}

/// Replies are consumed per order in script order; once a script runs out
/// the order keeps answering PROCESSING.
pub struct ScriptedAccrualClient {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
    active: Mutex<HashMap<String, usize>>,
    max_active_per_order: AtomicUsize,
    latency: Duration,
}

impl ScriptedAccrualClient {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            max_active_per_order: AtomicUsize::new(0),
            latency,
        }
    }

    pub fn script(&self, number: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(number.to_string(), replies.into());
    }

    pub fn calls(&self, number: &str) -> usize {
        self.calls.lock().unwrap().get(number).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of simultaneous requests ever seen for one order
    pub fn max_active_per_order(&self) -> usize {
        self.max_active_per_order.load(Ordering::SeqCst)
    }

    fn enter(&self, number: &str) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(number.to_string())
            .or_default() += 1;
        let mut active = self.active.lock().unwrap();
        let n = active.entry(number.to_string()).or_default();
        *n += 1;
        self.max_active_per_order.fetch_max(*n, Ordering::SeqCst);
    }

    fn leave(&self, number: &str) {
        if let Some(n) = self.active.lock().unwrap().get_mut(number) {
            *n -= 1;
        }
    }
}

#[async_trait]
impl AccrualClient for ScriptedAccrualClient {
    async fn fetch_verdict(&self, number: &str) -> Result<Verdict, AccrualError> {
        self.enter(number);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(number)
            .and_then(|q| q.pop_front())
            .unwrap_or(Reply::Verdict(OrderStatus::Processing, Decimal::ZERO));
        self.leave(number);

        match reply {
            Reply::Verdict(status, accrual) => Ok(Verdict::new(number, status, accrual)),
            Reply::NotRegistered => Err(AccrualError::NotRegistered(number.to_string())),
            Reply::Malformed => Err(AccrualError::Malformed("scripted".to_string())),
            Reply::RateLimited(retry_after) => Err(AccrualError::RateLimited { retry_after }),
        }
    }
}
