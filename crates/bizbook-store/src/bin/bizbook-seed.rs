//! # bizbook-seed
//!
//! Opens (or creates) the local BizBook database, seeds the sample business
//! when it is empty, and prints a summary.
//!
//! ## Environment
//! - `RUST_LOG` - log filter (default `info,bizbook=debug,sqlx=warn`)
//! - `BIZBOOK_DATABASE_PATH` - database file
//! - `BIZBOOK_OWNER_ID` - scope to seed
//! - other `BIZBOOK_*` overrides, see `StoreConfig`

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bizbook_core::analytics::TimeRange;
use bizbook_db::{Database, DbConfig};
use bizbook_store::{BusinessStore, SqlitePort, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = StoreConfig::load(None)?;
    config.store.seed_on_empty = true;
    // Seeding needs only the initial load and the write path.
    config.persistence.subscribe = false;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %db_path.display(), "Opening database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let mut port = SqlitePort::new(db.clone(), config.device_id())
        .with_poll_interval(config.poll_interval())
        .with_batch_size(config.persistence.batch_size);
    if let Some(retention) = config.change_log_retention() {
        port = port.with_retention(retention);
    }
    let store = BusinessStore::new(Arc::new(port), config);

    let counts = store.load().await?;
    store.flush().await?;
    info!(
        scope = %store.scope(),
        products = counts.products,
        customers = counts.customers,
        invoices = counts.invoices,
        payments = counts.payments,
        stock_movements = counts.stock_movements,
        "Business data ready"
    );

    let currency = store.settings().currency.clone();
    let dashboard = store.dashboard(TimeRange::Month);
    info!(
        total_sales = %dashboard.total_sales.display_in(&currency),
        total_expenses = %dashboard.total_expenses.display_in(&currency),
        profit = %dashboard.profit.display_in(&currency),
        inventory_value = %dashboard.inventory_value.display_in(&currency),
        outstanding = %dashboard.outstanding.display_in(&currency),
        low_stock = dashboard.low_stock_products,
        pending_invoices = dashboard.pending_invoices,
        overdue_invoices = dashboard.overdue_invoices,
        "Dashboard (last month)"
    );

    store.shutdown().await?;
    db.close().await;
    Ok(())
}

/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bizbook_store=trace` - Trace the store only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bizbook=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
