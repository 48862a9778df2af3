//! In-memory order store
//!
//! Used by tests and by the binary's `--memory` dry-run mode. All state sits
//! behind one `RwLock`; `withdraw` runs its read, allocation and append in a
//! single write section, which gives the same per-owner serialization the
//! PostgreSQL store gets from its advisory lock.
//!
//! Reads and writes can be made to fail on demand to exercise the pipeline's
//! transient-error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{OrderStore, StoreError};
use crate::models::{
    Balance, Order, OrderRemaining, OrderStatus, SubmitOutcome, Verdict, WithdrawOutcome, WriteOff,
};
use crate::validation::OrderNumber;
use crate::withdrawal::allocator::{InsufficientFunds, allocate};

#[derive(Default)]
struct State {
    orders: HashMap<String, Order>,
    writeoffs: Vec<WriteOff>,
}

impl State {
    fn spent_on(&self, owner: &str, number: &str) -> Decimal {
        self.writeoffs
            .iter()
            .filter(|w| w.owner == owner && w.order_number == number)
            .map(|w| w.amount)
            .sum()
    }

    fn remaining_of(&self, owner: &str) -> Vec<OrderRemaining> {
        self.orders
            .values()
            .filter(|o| o.owner == owner && o.status == OrderStatus::Processed)
            .map(|o| OrderRemaining {
                number: o.number.clone(),
                submitted_at: o.submitted_at,
                remaining: o.accrual - self.spent_on(owner, &o.number),
            })
            .filter(|r| r.remaining > Decimal::ZERO)
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    state: RwLock<State>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read operation fail with `StoreError::Unavailable`
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write operation fail with `StoreError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace an order as-is (test seeding)
    pub fn put_order(&self, order: Order) -> Result<(), StoreError> {
        self.write()?.orders.insert(order.number.clone(), order);
        Ok(())
    }

    pub fn order(&self, number: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.orders.get(number).cloned())
    }

    pub fn writeoff_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.writeoffs.len())
    }

    /// Sum of write-offs taken from one order
    pub fn spent_on(&self, number: &str) -> Result<Decimal, StoreError> {
        Ok(self
            .read()?
            .writeoffs
            .iter()
            .filter(|w| w.order_number == number)
            .map(|w| w.amount)
            .sum())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn submit_order(
        &self,
        owner: &str,
        number: &OrderNumber,
        at: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError> {
        self.check(&self.fail_writes, "write")?;
        let mut state = self.write()?;

        if let Some(existing) = state.orders.get(number.as_str()) {
            return Ok(if existing.owner == owner {
                SubmitOutcome::AlreadyOwnedByCaller
            } else {
                SubmitOutcome::OwnedByOther
            });
        }

        state.orders.insert(
            number.as_str().to_string(),
            Order::new(number.as_str(), owner, at),
        );
        Ok(SubmitOutcome::Accepted)
    }

    async fn find_awaiting_verdict(
        &self,
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.check(&self.fail_reads, "read")?;
        let state = self.read()?;

        let mut pending: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| OrderStatus::AWAITING_VERDICT.contains(&o.status))
            .filter(|o| !exclude.contains(&o.number))
            .collect();
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.number.cmp(&b.number))
        });

        Ok(pending
            .into_iter()
            .take(limit)
            .map(|o| o.number.clone())
            .collect())
    }

    async fn apply_verdict(&self, verdict: &Verdict) -> Result<bool, StoreError> {
        self.check(&self.fail_writes, "write")?;
        let mut state = self.write()?;

        match state.orders.get_mut(&verdict.order) {
            Some(order) if !order.status.is_terminal() => {
                order.status = verdict.status;
                order.accrual = verdict.accrual;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn orders_of(&self, owner: &str) -> Result<Vec<Order>, StoreError> {
        self.check(&self.fail_reads, "read")?;
        let state = self.read()?;

        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(orders)
    }

    async fn withdrawals_of(&self, owner: &str) -> Result<Vec<WriteOff>, StoreError> {
        self.check(&self.fail_reads, "read")?;
        let state = self.read()?;

        // Ledger is append-only, insertion order breaks timestamp ties
        let mut rows: Vec<WriteOff> = state
            .writeoffs
            .iter()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.processed_at);
        Ok(rows)
    }

    async fn balance(&self, owner: &str) -> Result<Balance, StoreError> {
        self.check(&self.fail_reads, "read")?;
        let state = self.read()?;

        let accrued: Decimal = state
            .orders
            .values()
            .filter(|o| o.owner == owner)
            .map(Order::spendable_accrual)
            .sum();
        let withdrawn: Decimal = state
            .writeoffs
            .iter()
            .filter(|w| w.owner == owner)
            .map(|w| w.amount)
            .sum();

        Ok(Balance::from_totals(accrued, withdrawn))
    }

    async fn withdraw(
        &self,
        owner: &str,
        withdrawal_ref: &OrderNumber,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<WithdrawOutcome, StoreError> {
        self.check(&self.fail_writes, "write")?;
        let mut state = self.write()?;

        let remaining = state.remaining_of(owner);
        let plan = match allocate(&remaining, amount) {
            Ok(plan) => plan,
            Err(InsufficientFunds {
                available,
                requested,
            }) => {
                return Ok(WithdrawOutcome::InsufficientFunds {
                    available,
                    requested,
                });
            }
        };

        let rows: Vec<WriteOff> = plan
            .into_iter()
            .map(|a| WriteOff {
                owner: owner.to_string(),
                order_number: a.order_number,
                withdrawal_ref: withdrawal_ref.as_str().to_string(),
                amount: a.amount,
                processed_at: at,
            })
            .collect();
        state.writeoffs.extend(rows.iter().cloned());

        Ok(WithdrawOutcome::Success(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn number(raw: &str) -> OrderNumber {
        OrderNumber::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_submit_is_idempotent_per_owner() {
        let store = MemoryOrderStore::new();
        let n = number("12345678903");
        let now = Utc::now();

        assert_eq!(
            store.submit_order("alice", &n, now).await.unwrap(),
            SubmitOutcome::Accepted
        );
        assert_eq!(
            store.submit_order("alice", &n, now).await.unwrap(),
            SubmitOutcome::AlreadyOwnedByCaller
        );
        assert_eq!(
            store.submit_order("bob", &n, now).await.unwrap(),
            SubmitOutcome::OwnedByOther
        );

        let order = store.order("12345678903").unwrap().unwrap();
        assert_eq!(order.owner, "alice");
        assert_eq!(order.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_apply_verdict_skips_terminal_orders() {
        let store = MemoryOrderStore::new();
        store
            .submit_order("alice", &number("12345678903"), Utc::now())
            .await
            .unwrap();

        let done = Verdict::new("12345678903", OrderStatus::Processed, dec!(50));
        assert!(store.apply_verdict(&done).await.unwrap());
        assert!(!store.apply_verdict(&done).await.unwrap());

        let late = Verdict::new("12345678903", OrderStatus::Processing, Decimal::ZERO);
        assert!(!store.apply_verdict(&late).await.unwrap());

        let order = store.order("12345678903").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, dec!(50));
    }

    #[tokio::test]
    async fn test_apply_verdict_unknown_order() {
        let store = MemoryOrderStore::new();
        let v = Verdict::new("79927398713", OrderStatus::Invalid, Decimal::ZERO);
        assert!(!store.apply_verdict(&v).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_awaiting_verdict_filters_by_status() {
        let store = MemoryOrderStore::new();
        let t0 = Utc::now();
        let statuses = [
            ("12345678903", OrderStatus::New),
            ("79927398713", OrderStatus::Registered),
            ("4561261212345467", OrderStatus::Processing),
            ("18", OrderStatus::Processed),
            ("26", OrderStatus::Invalid),
        ];
        for (i, (n, status)) in statuses.iter().enumerate() {
            store
                .put_order(Order {
                    status: *status,
                    ..Order::new(*n, "alice", t0 + chrono::Duration::seconds(i as i64))
                })
                .unwrap();
        }

        let awaiting = store.find_awaiting_verdict(&[], 10).await.unwrap();
        assert_eq!(awaiting, ["12345678903", "79927398713", "4561261212345467"]);

        let rest = store
            .find_awaiting_verdict(&["79927398713".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(rest, ["12345678903", "4561261212345467"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryOrderStore::new();
        store.set_fail_reads(true);
        assert!(matches!(
            store.find_awaiting_verdict(&[], 10).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_fail_reads(false);
        assert!(store.find_awaiting_verdict(&[], 10).await.is_ok());

        store.set_fail_writes(true);
        let v = Verdict::new("79927398713", OrderStatus::Invalid, Decimal::ZERO);
        assert!(store.apply_verdict(&v).await.is_err());
    }
}
