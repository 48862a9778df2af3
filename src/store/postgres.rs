//! PostgreSQL order store
//!
//! Tables:
//! - `orders`: one row per order number (primary key), owner, submission
//!   time, status and accrual
//! - `withdrawals`: append-only write-off ledger
//!
//! Withdrawals take `pg_advisory_xact_lock(hashtext(owner))` as the first
//! statement of their transaction. Two withdrawals of the same owner therefore
//! run one after the other, and the second one sees the first one's rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::{debug, info};

use super::{OrderStore, StoreError};
use crate::models::{
    Balance, Order, OrderRemaining, OrderStatus, SubmitOutcome, Verdict, WithdrawOutcome, WriteOff,
};
use crate::validation::OrderNumber;
use crate::withdrawal::allocator::{InsufficientFunds, allocate};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS orders (
        number       TEXT PRIMARY KEY,
        owner        TEXT NOT NULL,
        submitted_at TIMESTAMPTZ NOT NULL,
        status       TEXT NOT NULL DEFAULT 'NEW',
        accrual      NUMERIC(15,2) NOT NULL DEFAULT 0 CHECK (accrual >= 0)
    )"#,
    "CREATE INDEX IF NOT EXISTS orders_owner_idx ON orders (owner, submitted_at)",
    "CREATE INDEX IF NOT EXISTS orders_status_idx ON orders (status, submitted_at)",
    r#"CREATE TABLE IF NOT EXISTS withdrawals (
        id             BIGSERIAL PRIMARY KEY,
        owner          TEXT NOT NULL,
        order_number   TEXT NOT NULL REFERENCES orders (number),
        withdrawal_ref TEXT NOT NULL,
        amount         NUMERIC(15,2) NOT NULL CHECK (amount > 0),
        processed_at   TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS withdrawals_owner_idx ON withdrawals (owner, processed_at)",
];

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!("Order store schema ready");
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order, StoreError> {
        let status: String = row.try_get("status")?;
        let status = OrderStatus::from_str(&status).map_err(|reason| StoreError::Corrupt {
            table: "orders",
            reason,
        })?;

        Ok(Order {
            number: row.try_get("number")?,
            owner: row.try_get("owner")?,
            submitted_at: row.try_get("submitted_at")?,
            status,
            accrual: row.try_get("accrual")?,
        })
    }

    fn row_to_writeoff(row: &PgRow) -> Result<WriteOff, StoreError> {
        Ok(WriteOff {
            owner: row.try_get("owner")?,
            order_number: row.try_get("order_number")?,
            withdrawal_ref: row.try_get("withdrawal_ref")?,
            amount: row.try_get("amount")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn submit_order(
        &self,
        owner: &str,
        number: &OrderNumber,
        at: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError> {
        // Primary key decides the race between two concurrent submitters
        let inserted = sqlx::query(
            r#"INSERT INTO orders (number, owner, submitted_at, status, accrual)
               VALUES ($1, $2, $3, 'NEW', 0)
               ON CONFLICT (number) DO NOTHING"#,
        )
        .bind(number.as_str())
        .bind(owner)
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            return Ok(SubmitOutcome::Accepted);
        }

        let existing: String = sqlx::query_scalar("SELECT owner FROM orders WHERE number = $1")
            .bind(number.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(if existing == owner {
            SubmitOutcome::AlreadyOwnedByCaller
        } else {
            SubmitOutcome::OwnedByOther
        })
    }

    async fn find_awaiting_verdict(
        &self,
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let awaiting: Vec<&str> = OrderStatus::AWAITING_VERDICT
            .iter()
            .map(OrderStatus::as_str)
            .collect();

        let numbers: Vec<String> = sqlx::query_scalar(
            r#"SELECT number FROM orders
               WHERE status = ANY($1)
                 AND NOT (number = ANY($2))
               ORDER BY submitted_at, number
               LIMIT $3"#,
        )
        .bind(awaiting)
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    async fn apply_verdict(&self, verdict: &Verdict) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE orders SET accrual = $1, status = $2
               WHERE number = $3 AND status NOT IN ('PROCESSED', 'INVALID')"#,
        )
        .bind(verdict.accrual)
        .bind(verdict.status.as_str())
        .bind(&verdict.order)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(updated > 0)
    }

    async fn orders_of(&self, owner: &str) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT number, owner, submitted_at, status, accrual
               FROM orders WHERE owner = $1
               ORDER BY submitted_at, number"#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn withdrawals_of(&self, owner: &str) -> Result<Vec<WriteOff>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT owner, order_number, withdrawal_ref, amount, processed_at
               FROM withdrawals WHERE owner = $1
               ORDER BY processed_at, id"#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_writeoff).collect()
    }

    async fn balance(&self, owner: &str) -> Result<Balance, StoreError> {
        let row = sqlx::query(
            r#"SELECT
                 (SELECT COALESCE(SUM(accrual), 0) FROM orders
                   WHERE owner = $1 AND status = 'PROCESSED') AS accrued,
                 (SELECT COALESCE(SUM(amount), 0) FROM withdrawals
                   WHERE owner = $1) AS withdrawn"#,
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        let accrued: Decimal = row.try_get("accrued")?;
        let withdrawn: Decimal = row.try_get("withdrawn")?;
        Ok(Balance::from_totals(accrued, withdrawn))
    }

    async fn withdraw(
        &self,
        owner: &str,
        withdrawal_ref: &OrderNumber,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<WithdrawOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialize every withdrawal of this owner until commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(
            r#"SELECT o.number, o.submitted_at,
                      o.accrual - COALESCE(w.spent, 0) AS remaining
               FROM orders o
               LEFT JOIN (
                   SELECT order_number, SUM(amount) AS spent
                   FROM withdrawals WHERE owner = $1
                   GROUP BY order_number
               ) w ON w.order_number = o.number
               WHERE o.owner = $1
                 AND o.status = 'PROCESSED'
                 AND o.accrual - COALESCE(w.spent, 0) > 0
               ORDER BY o.submitted_at, o.number"#,
        )
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        let remaining = rows
            .iter()
            .map(|r| -> Result<OrderRemaining, StoreError> {
                Ok(OrderRemaining {
                    number: r.try_get("number")?,
                    submitted_at: r.try_get("submitted_at")?,
                    remaining: r.try_get("remaining")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let plan = match allocate(&remaining, amount) {
            Ok(plan) => plan,
            Err(InsufficientFunds {
                available,
                requested,
            }) => {
                // Dropping `tx` rolls back and releases the lock
                debug!(owner, %available, %requested, "Withdrawal rejected, insufficient funds");
                return Ok(WithdrawOutcome::InsufficientFunds {
                    available,
                    requested,
                });
            }
        };

        let mut written = Vec::with_capacity(plan.len());
        for allocation in plan {
            sqlx::query(
                r#"INSERT INTO withdrawals
                       (owner, order_number, withdrawal_ref, amount, processed_at)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(owner)
            .bind(&allocation.order_number)
            .bind(withdrawal_ref.as_str())
            .bind(allocation.amount)
            .bind(at)
            .execute(&mut *tx)
            .await?;

            written.push(WriteOff {
                owner: owner.to_string(),
                order_number: allocation.order_number,
                withdrawal_ref: withdrawal_ref.as_str().to_string(),
                amount: allocation.amount,
                processed_at: at,
            });
        }

        tx.commit().await?;
        Ok(WithdrawOutcome::Success(written))
    }
}
