//! Order Store
//!
//! Storage port for orders and the write-off ledger. Every balance-affecting
//! mutation happens inside one store transaction:
//!
//! - `apply_verdict`: single-row update, never rewrites a terminal order
//! - `withdraw`: balance read, allocation and ledger append, serialized per
//!   owner so concurrent withdrawals cannot double-spend
//!
//! Implementations:
//! - [`PgOrderStore`] - PostgreSQL via sqlx
//! - [`MemoryOrderStore`] - in-process, for tests and dry runs

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Balance, Order, SubmitOutcome, Verdict, WithdrawOutcome, WriteOff};
use crate::validation::OrderNumber;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record a new order in status NEW.
    ///
    /// Idempotent for the same owner; a number owned by someone else is
    /// reported as `OwnedByOther` and left untouched.
    async fn submit_order(
        &self,
        owner: &str,
        number: &OrderNumber,
        at: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError>;

    /// Numbers of orders still waiting for a verdict, oldest first.
    ///
    /// Numbers listed in `exclude` are skipped; at most `limit` are returned.
    async fn find_awaiting_verdict(
        &self,
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Write a verdict's status and accrual in one transaction.
    ///
    /// Returns `false` when nothing was written (unknown order, or order
    /// already terminal).
    async fn apply_verdict(&self, verdict: &Verdict) -> Result<bool, StoreError>;

    /// Orders of `owner`, oldest first
    async fn orders_of(&self, owner: &str) -> Result<Vec<Order>, StoreError>;

    /// Write-offs of `owner`, oldest first
    async fn withdrawals_of(&self, owner: &str) -> Result<Vec<WriteOff>, StoreError>;

    /// Accrued-minus-withdrawn balance of `owner`
    async fn balance(&self, owner: &str) -> Result<Balance, StoreError>;

    /// Spend `amount` from the owner's processed orders, oldest first.
    ///
    /// `amount` must already be validated as positive. Either every write-off
    /// of the allocation is committed or none is.
    async fn withdraw(
        &self,
        owner: &str,
        withdrawal_ref: &OrderNumber,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<WithdrawOutcome, StoreError>;
}
