//! In-flight order set
//!
//! Order numbers currently queued, being requested, or waiting for their
//! verdict to be written. Discovery claims numbers; the requester (on a failed
//! attempt) and the updater (after every write attempt) release them.
//! A claimed number is never handed to the work queue a second time.

use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct InFlightSet {
    orders: DashSet<String>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an order number. Returns `false` if it is already in flight.
    pub fn try_claim(&self, number: &str) -> bool {
        self.orders.insert(number.to_string())
    }

    /// Release an order number. Returns `false` if it was not in flight.
    pub fn release(&self, number: &str) -> bool {
        self.orders.remove(number).is_some()
    }

    pub fn contains(&self, number: &str) -> bool {
        self.orders.contains(number)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Point-in-time copy of the claimed numbers
    pub fn snapshot(&self) -> Vec<String> {
        self.orders.iter().map(|n| n.key().clone()).collect()
    }
}
