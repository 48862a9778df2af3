//! Order, write-off and balance types shared by the pipeline and the ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Order Status
// ============================================================================

/// Lifecycle of an order inside the accrual program.
///
/// ```text
/// NEW ──▶ REGISTERED ──▶ PROCESSING ──▶ PROCESSED
///  │           │              │
///  └───────────┴──────────────┴──────▶ INVALID
/// ```
///
/// Terminal states: PROCESSED, INVALID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Registered,
    Processing,
    Processed,
    Invalid,
}

impl OrderStatus {
    /// Statuses that still wait for a verdict from the scoring service
    pub const AWAITING_VERDICT: [OrderStatus; 3] = [
        OrderStatus::New,
        OrderStatus::Registered,
        OrderStatus::Processing,
    ];

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "REGISTERED" => Ok(OrderStatus::Registered),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "PROCESSED" => Ok(OrderStatus::Processed),
            "INVALID" => Ok(OrderStatus::Invalid),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Order row
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub number: String,
    pub owner: String,
    pub submitted_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub accrual: Decimal,
}

impl Order {
    /// A freshly submitted order: NEW, zero accrual
    pub fn new(number: impl Into<String>, owner: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            number: number.into(),
            owner: owner.into(),
            submitted_at: at,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
        }
    }

    /// Accrual that counts towards the owner's balance
    pub fn spendable_accrual(&self) -> Decimal {
        if self.status == OrderStatus::Processed {
            self.accrual
        } else {
            Decimal::ZERO
        }
    }
}

/// Write-off ledger row. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOff {
    pub owner: String,
    /// Order the points were taken from
    pub order_number: String,
    /// Order the customer spent the points on
    pub withdrawal_ref: String,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Accrual verdict returned by the scoring service for one order
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub order: String,
    pub status: OrderStatus,
    /// Only meaningful when `status` is PROCESSED, zero otherwise
    pub accrual: Decimal,
}

impl Verdict {
    pub fn new(order: impl Into<String>, status: OrderStatus, accrual: Decimal) -> Self {
        let accrual = if status == OrderStatus::Processed {
            accrual
        } else {
            Decimal::ZERO
        };
        Self {
            order: order.into(),
            status,
            accrual,
        }
    }
}

/// Unspent part of one processed order, input to the allocator
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRemaining {
    pub number: String,
    pub submitted_at: DateTime<Utc>,
    pub remaining: Decimal,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of submitting an order number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New order recorded in status NEW
    Accepted,
    /// The caller already submitted this number
    AlreadyOwnedByCaller,
    /// Another user owns this number
    OwnedByOther,
    /// The number is malformed or fails the checksum
    Invalid,
}

/// Result of a withdrawal request
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawOutcome {
    /// One write-off per touched order, in allocation order
    Success(Vec<WriteOff>),
    /// Nothing was recorded
    InsufficientFunds { available: Decimal, requested: Decimal },
    /// The referenced order number is malformed
    InvalidOrder,
}

// ============================================================================
// Views
// ============================================================================

/// Derived balance of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl Balance {
    /// `current = accrued - withdrawn`
    pub fn from_totals(accrued: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: accrued - withdrawn,
            withdrawn,
        }
    }
}

/// Order as listed to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let accrual = (order.status == OrderStatus::Processed).then_some(order.accrual);
        Self {
            number: order.number,
            status: order.status,
            accrual,
            uploaded_at: order.submitted_at,
        }
    }
}

/// Write-off as listed to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalView {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<WriteOff> for WithdrawalView {
    fn from(w: WriteOff) -> Self {
        Self {
            order: w.order_number,
            sum: w.amount,
            processed_at: w.processed_at,
        }
    }
}
