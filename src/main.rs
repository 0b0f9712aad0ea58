// src/main.rs - Inventory ledger service
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_ledger::config::{load_config, Config, DatabaseConfig};
use inventory_ledger::monitoring::{report_low_stock, start_refresh_task, LedgerMetrics};
use inventory_ledger::seed::seed_demo_data;
use inventory_ledger::{db, DeviceDirectory, InMemoryDeviceDirectory, InventoryLedger, MemoryRowStore, RowStore, SqliteRowStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    if config.uses_memory_store() {
        log::warn!("Running on the in-memory store, changes are lost on exit");
        return run(config, MemoryRowStore::new(), InMemoryDeviceDirectory::default()).await;
    }

    setup_database(&config.database.url).await?;
    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let directory = InMemoryDeviceDirectory::load(&pool)
        .await
        .context("Failed to load device directory")?;

    run(config, SqliteRowStore::new(pool), directory).await
}

async fn run<S, D>(config: Config, rows: S, directory: D) -> anyhow::Result<()>
where
    S: RowStore + 'static,
    D: DeviceDirectory + 'static,
{
    let metrics = Arc::new(LedgerMetrics::new());
    let mut ledger = InventoryLedger::new(config.ledger.clone(), rows, directory)
        .with_metrics(metrics.clone());
    ledger.refresh().await.context("Failed to load inventory")?;

    if config.ledger.seed_demo_data && seed_demo_data(&mut ledger).await? {
        log::info!("Demo data written");
    }

    let summary = ledger.summary();
    log::info!(
        "📊 {} toner models, {} units on hand, {} low; {} receipts, {} issuances",
        summary.total_models,
        summary.total_units,
        summary.low_stock_models,
        summary.received_records,
        summary.issued_records
    );
    report_low_stock(&ledger);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", serde_json::to_string_pretty(&ledger.stock_status())?);

    let interval = config.ledger.refresh_interval_seconds;
    if interval == 0 {
        return Ok(());
    }

    let ledger = Arc::new(Mutex::new(ledger));
    let handle = start_refresh_task(ledger.clone(), Duration::from_secs(interval));

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down...");
    if let Some(handle) = handle {
        handle.abort();
    }

    log::info!("Metrics at shutdown: {}", serde_json::to_string(&metrics.snapshot())?);
    Ok(())
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = config.logging.level.as_str();
            tracing_subscriber::EnvFilter::new(level)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn setup_database(database_url: &str) -> anyhow::Result<()> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        log::info!("Creating database: {}", database_url);
        Sqlite::create_database(database_url).await?;
    }
    Ok(())
}

async fn create_database_pool(db_config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database url: {}", db_config.url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .connect_with(options)
        .await?;
    Ok(pool)
}
