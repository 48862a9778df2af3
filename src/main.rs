//! Bonus Accrual - accrual pipeline daemon
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌─────────────┐    ┌─────────┐
//! │  Config  │───▶│ Discovery │───▶│ Requester×N │───▶│ Updater │
//! │  (YAML)  │    │  (store)  │    │   (HTTP)    │    │ (store) │
//! └──────────┘    └───────────┘    └─────────────┘    └─────────┘
//! ```
//!
//! Flags:
//! - `--env/-e <name>`  config file `config/<name>.yaml` (default `dev`)
//! - `-d <uri>`         PostgreSQL URI, overrides `DATABASE_URI`
//! - `-r <address>`     accrual service address, overrides `ACCRUAL_SYSTEM_ADDRESS`
//! - `--memory`         run against the in-memory store (dry run)

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use bonus_accrual::accrual::HttpAccrualClient;
use bonus_accrual::config::AppConfig;
use bonus_accrual::db::Database;
use bonus_accrual::logging::init_logging;
use bonus_accrual::pipeline::AccrualPipeline;
use bonus_accrual::store::{MemoryOrderStore, OrderStore, PgOrderStore};

// ============================================================
// COMMAND LINE
// ============================================================

fn arg_value(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn use_memory_store() -> bool {
    std::env::args().any(|a| a == "--memory")
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env).context("Failed to load configuration")?;
    if let Some(url) = arg_value(&["-d"]) {
        config.database.url = url;
    }
    if let Some(address) = arg_value(&["-r"]) {
        config.accrual.base_address = address;
    }
    config.validate()?;

    let _log_guard = init_logging(&config);
    info!("Starting bonus accrual in {} mode", env);

    let store: Arc<dyn OrderStore> = if use_memory_store() {
        warn!("Using in-memory store, nothing will be persisted");
        Arc::new(MemoryOrderStore::new())
    } else {
        let db = Database::connect(&config.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        db.health_check().await.context("PostgreSQL health check failed")?;
        let store = PgOrderStore::new(db.pool().clone());
        store.ensure_schema().await.context("Failed to create schema")?;
        Arc::new(store)
    };

    let client = Arc::new(HttpAccrualClient::new(&config.accrual)?);
    info!(address = %config.accrual.base_address, "Accrual service client ready");

    let handle = AccrualPipeline::new(store, client, config.pipeline.clone()).start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    info!("Bonus accrual stopped");
    Ok(())
}
