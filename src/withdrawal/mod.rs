//! Bonus withdrawals
//!
//! A withdrawal spends points from the owner's processed orders. The
//! [`allocator`] decides how much to take from each order; the
//! [`OrderStore`](crate::store::OrderStore) runs the allocation inside one
//! transaction that is serialized per owner, so the balance read and the
//! ledger append can never interleave with another withdrawal of the same
//! user.

pub mod allocator;

pub use allocator::{Allocation, InsufficientFunds, allocate, spendable};
