//! Bonus Service
//!
//! User-facing operations on top of an [`OrderStore`]. Input is validated
//! here; everything that touches balances is delegated to one store call so
//! it runs inside a single transaction.
//!
//! | Operation          | Result                                            |
//! |--------------------|---------------------------------------------------|
//! | `submit_order`     | Accepted / AlreadyOwnedByCaller / OwnedByOther / Invalid |
//! | `balance`          | `{current, withdrawn}`                            |
//! | `withdraw`         | Success / InsufficientFunds / InvalidOrder        |
//! | `list_orders`      | orders by upload time                             |
//! | `list_withdrawals` | write-offs by processing time                     |

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Balance, OrderView, SubmitOutcome, WithdrawOutcome, WithdrawalView};
use crate::store::{OrderStore, StoreError};
use crate::validation::{OrderNumber, ValidationError, validate_amount};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(ValidationError::NonPositiveAmount(_)) => "INVALID_AMOUNT",
            ServiceError::Validation(ValidationError::PrecisionOverflow { .. }) => {
                "PRECISION_OVERFLOW"
            }
            ServiceError::Validation(_) => "INVALID_ORDER_NUMBER",
            ServiceError::Store(StoreError::Corrupt { .. }) => "DATA_CORRUPT",
            ServiceError::Store(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// `true` if the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Validation(_) => false,
            ServiceError::Store(e) => e.is_transient(),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct BonusService {
    store: Arc<dyn OrderStore>,
}

impl BonusService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Register an order number for accrual.
    ///
    /// A malformed or checksum-failing number is an `Invalid` outcome, not
    /// an error.
    pub async fn submit_order(&self, owner: &str, raw: &str) -> Result<SubmitOutcome, ServiceError> {
        let number = match OrderNumber::new(raw) {
            Ok(number) => number,
            Err(e) => {
                debug!(owner, order = raw, error = %e, "Rejected order number");
                return Ok(SubmitOutcome::Invalid);
            }
        };

        let outcome = self.store.submit_order(owner, &number, Utc::now()).await?;
        debug!(owner, order = %number, ?outcome, "Order submitted");
        Ok(outcome)
    }

    pub async fn balance(&self, owner: &str) -> Result<Balance, ServiceError> {
        Ok(self.store.balance(owner).await?)
    }

    /// Spend `amount` points against order `raw`.
    ///
    /// Points come from the owner's processed orders, oldest first. Nothing
    /// is recorded unless the whole amount is covered.
    pub async fn withdraw(
        &self,
        owner: &str,
        raw: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome, ServiceError> {
        let Ok(withdrawal_ref) = OrderNumber::new(raw) else {
            return Ok(WithdrawOutcome::InvalidOrder);
        };
        let amount = validate_amount(amount)?;

        let outcome = self
            .store
            .withdraw(owner, &withdrawal_ref, amount, Utc::now())
            .await?;

        match &outcome {
            WithdrawOutcome::Success(rows) => info!(
                owner,
                order = %withdrawal_ref,
                %amount,
                orders_touched = rows.len(),
                "Withdrawal committed"
            ),
            WithdrawOutcome::InsufficientFunds { available, .. } => info!(
                owner,
                order = %withdrawal_ref,
                %amount,
                %available,
                "Withdrawal rejected: insufficient funds"
            ),
            WithdrawOutcome::InvalidOrder => {}
        }
        Ok(outcome)
    }

    pub async fn list_orders(&self, owner: &str) -> Result<Vec<OrderView>, ServiceError> {
        let orders = self.store.orders_of(owner).await?;
        Ok(orders.into_iter().map(OrderView::from).collect())
    }

    pub async fn list_withdrawals(&self, owner: &str) -> Result<Vec<WithdrawalView>, ServiceError> {
        let rows = self.store.withdrawals_of(owner).await?;
        Ok(rows.into_iter().map(WithdrawalView::from).collect())
    }
}
