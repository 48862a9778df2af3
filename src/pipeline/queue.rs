//! Bounded async queue
//!
//! A `crossbeam_queue::ArrayQueue` with two `Notify` wakers so that
//! producers and consumers park on a tokio task instead of spinning.
//!
//! | Operation  | Full / empty behaviour                         |
//! |------------|------------------------------------------------|
//! | `try_push` | never waits, hands the item back when full     |
//! | `push`     | waits for a free slot                          |
//! | `pop`      | waits for an item, `None` once closed + empty  |
//!
//! Closing wakes every waiter. Items already queued can still be popped,
//! new pushes are refused.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
    not_empty: Notify,
    not_full: Notify,
    closed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    /// # Panics
    /// If `capacity` is zero (rejected earlier by config validation).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Push without waiting. Returns the item if the queue is full or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }
        self.inner.push(item)?;
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push, waiting for space. Returns the item if the queue gets closed.
    pub async fn push(&self, mut item: T) -> Result<(), T> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent pop/close is not missed
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(item);
            }
            match self.inner.push(item) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(back) => item = back,
            }

            notified.await;
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<T> {
        let item = self.inner.pop()?;
        self.not_full.notify_one();
        Some(item)
    }

    /// Pop, waiting for an item. `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    /// Refuse further pushes and wake every waiter
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }
}
