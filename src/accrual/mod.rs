//! Accrual service integration
//!
//! The scoring service decides how many bonus points an order earns. The
//! pipeline talks to it only through [`AccrualClient`], so tests can swap in
//! a scripted client.

pub mod client;
pub mod error;

#[cfg(test)]
pub mod mock;

pub use client::{AccrualClient, HttpAccrualClient, decode_verdict};
pub use error::AccrualError;
