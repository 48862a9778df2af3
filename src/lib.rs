//! Bonus Accrual - loyalty points ledger
//!
//! Customers register purchase order numbers; an external scoring service
//! decides how many points each order earns; customers spend points by
//! writing them off against new orders.
//!
//! ```text
//!                ┌──────────────┐  submit / withdraw / list  ┌────────────┐
//!   caller ────▶ │ BonusService │ ─────────────────────────▶ │            │
//!                └──────────────┘                            │ OrderStore │
//!   ┌───────────────────────────────────────────────┐        │ (Pg / mem) │
//!   │ AccrualPipeline                               │ ◀────▶ │            │
//!   │ Discovery ─▶ Requester×N ─▶ Updater           │        └────────────┘
//!   └──────────────────┬────────────────────────────┘
//!                      ▼
//!              accrual scoring service (HTTP)
//! ```
//!
//! # Modules
//!
//! - [`validation`] - Order number (Luhn) and amount validation
//! - [`models`] - Orders, write-offs, verdicts and their views
//! - [`withdrawal`] - Oldest-first allocation of a withdrawal across orders
//! - [`store`] - Storage port with PostgreSQL and in-memory implementations
//! - [`accrual`] - Scoring service client
//! - [`pipeline`] - Discovery / request / update stages
//! - [`service`] - User-facing operations
//! - [`config`] - YAML configuration with environment overrides
//! - [`db`] - PostgreSQL pool
//! - [`logging`] - tracing subscriber setup

pub mod accrual;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod store;
pub mod validation;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use accrual::{AccrualClient, AccrualError, HttpAccrualClient};
pub use config::{AppConfig, ConfigError, PipelineConfig};
pub use models::{
    Balance, Order, OrderStatus, OrderView, SubmitOutcome, Verdict, WithdrawOutcome,
    WithdrawalView, WriteOff,
};
pub use pipeline::{AccrualPipeline, PipelineHandle, PipelineStatsSnapshot};
pub use service::{BonusService, ServiceError};
pub use store::{MemoryOrderStore, OrderStore, PgOrderStore, StoreError};
pub use validation::{OrderNumber, ValidationError};
