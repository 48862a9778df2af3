//! Withdrawal Allocation
//!
//! Spreads a requested amount across a user's processed orders, draining
//! the oldest order first. The function is pure: the caller owns the
//! transaction that reads the remaining balances and writes the result.
//!
//! # Ordering
//!
//! Orders are sorted by `(submitted_at, number)`. The number breaks ties
//! between orders submitted in the same instant so identical inputs always
//! produce identical allocations, whatever order the store returned rows in.

use rust_decimal::Decimal;

use crate::models::OrderRemaining;

/// Amount taken from one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub order_number: String,
    pub amount: Decimal,
}

/// The remaining balances do not cover the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Insufficient funds: available {available}, requested {requested}")]
pub struct InsufficientFunds {
    pub available: Decimal,
    pub requested: Decimal,
}

/// Total spendable amount over the given orders (non-positive entries ignored)
pub fn spendable(orders: &[OrderRemaining]) -> Decimal {
    orders
        .iter()
        .map(|o| o.remaining)
        .filter(|r| *r > Decimal::ZERO)
        .sum()
}

/// Allocate `requested` across `orders`.
///
/// Takes `min(remaining, still_needed)` from each order in `(submitted_at,
/// number)` order until the request is covered. Orders with nothing left are
/// skipped and never appear in the result.
///
/// # Errors
/// `InsufficientFunds` when the total remaining is below `requested`; no
/// partial allocation is returned in that case.
pub fn allocate(
    orders: &[OrderRemaining],
    requested: Decimal,
) -> Result<Vec<Allocation>, InsufficientFunds> {
    let available = spendable(orders);
    if available < requested {
        return Err(InsufficientFunds {
            available,
            requested,
        });
    }

    let mut ordered: Vec<&OrderRemaining> = orders
        .iter()
        .filter(|o| o.remaining > Decimal::ZERO)
        .collect();
    ordered.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.number.cmp(&b.number))
    });

    let mut still_needed = requested;
    let mut allocations = Vec::new();

    for order in ordered {
        if still_needed <= Decimal::ZERO {
            break;
        }
        let take = order.remaining.min(still_needed);
        still_needed -= take;
        allocations.push(Allocation {
            order_number: order.number.clone(),
            amount: take,
        });
    }

    debug_assert_eq!(still_needed, Decimal::ZERO);
    Ok(allocations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn rem(number: &str, at: i64, remaining: Decimal) -> OrderRemaining {
        OrderRemaining {
            number: number.to_string(),
            submitted_at: t(at),
            remaining,
        }
    }

    #[test]
    fn test_oldest_order_drained_first() {
        let orders = vec![rem("B", 2, dec!(300)), rem("A", 1, dec!(500))];

        let plan = allocate(&orders, dec!(700)).unwrap();

        assert_eq!(
            plan,
            vec![
                Allocation {
                    order_number: "A".into(),
                    amount: dec!(500)
                },
                Allocation {
                    order_number: "B".into(),
                    amount: dec!(200)
                },
            ]
        );
    }

    #[test]
    fn test_insufficient_funds_returns_no_plan() {
        let orders = vec![rem("A", 1, dec!(500))];

        let err = allocate(&orders, dec!(600)).unwrap_err();

        assert_eq!(err.available, dec!(500));
        assert_eq!(err.requested, dec!(600));
    }

    #[test]
    fn test_exact_balance_is_allowed() {
        let orders = vec![rem("A", 1, dec!(10.25)), rem("B", 2, dec!(0.75))];
        let plan = allocate(&orders, dec!(11)).unwrap();
        let total: Decimal = plan.iter().map(|a| a.amount).sum();
        assert_eq!(total, dec!(11));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_stops_at_first_order_that_covers_request() {
        let orders = vec![
            rem("A", 1, dec!(100)),
            rem("B", 2, dec!(100)),
            rem("C", 3, dec!(100)),
        ];
        let plan = allocate(&orders, dec!(50)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].order_number, "A");
        assert_eq!(plan[0].amount, dec!(50));
    }

    #[test]
    fn test_skips_exhausted_and_negative_orders() {
        let orders = vec![
            rem("A", 1, Decimal::ZERO),
            rem("B", 2, dec!(-5)),
            rem("C", 3, dec!(40)),
        ];
        assert_eq!(spendable(&orders), dec!(40));
        let plan = allocate(&orders, dec!(40)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].order_number, "C");
    }

    #[test]
    fn test_same_timestamp_tie_broken_by_number() {
        let forward = vec![rem("200", 5, dec!(10)), rem("100", 5, dec!(10))];
        let backward: Vec<_> = forward.iter().cloned().rev().collect();

        let a = allocate(&forward, dec!(15)).unwrap();
        let b = allocate(&backward, dec!(15)).unwrap();

        assert_eq!(a, b);
        assert_eq!(a[0].order_number, "100");
        assert_eq!(a[0].amount, dec!(10));
        assert_eq!(a[1].amount, dec!(5));
    }

    #[test]
    fn test_deterministic_across_repeated_calls() {
        let orders: Vec<_> = (0..20)
            .map(|i| rem(&format!("{:03}", i), i % 4, Decimal::from(i + 1)))
            .collect();
        let first = allocate(&orders, dec!(123)).unwrap();
        for _ in 0..10 {
            assert_eq!(allocate(&orders, dec!(123)).unwrap(), first);
        }
    }

    #[test]
    fn test_no_order_overdrawn() {
        let orders = vec![
            rem("A", 1, dec!(1.11)),
            rem("B", 2, dec!(2.22)),
            rem("C", 3, dec!(3.33)),
        ];
        let plan = allocate(&orders, dec!(5)).unwrap();
        for a in &plan {
            let source = orders.iter().find(|o| o.number == a.order_number).unwrap();
            assert!(a.amount > Decimal::ZERO);
            assert!(a.amount <= source.remaining);
        }
    }

    #[test]
    fn test_empty_orders() {
        assert!(allocate(&[], dec!(1)).is_err());
    }
}
