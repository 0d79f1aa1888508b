//! Points Ledger Binary
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin points-ledger
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG_PATH`: YAML config file; when unset, defaults plus the variables below
//! - `RUN_ADDRESS`: listen address (default: `:8080`)
//! - `DATABASE_URI`: ledger database path (default: `./data/ledger.db`)
//! - `ACCRUAL_SYSTEM_ADDRESS`: accrual system base URL (default: `http://localhost:8081`)
//! - `SECRET_KEY`: gateway token expected in `X-Gateway-Token` (default: none)
//! - `ACCRUAL_TIMEOUT_MS`, `RECONCILIATION_INTERVAL_MS`,
//!   `RECONCILIATION_MAX_CONCURRENCY`, `RECONCILIATION_BATCH_SIZE`, `METRICS_PORT`
//! - `RUST_LOG`: log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use points_ledger::application::services::ReconciliationDriver;
use points_ledger::application::use_cases::{BalanceLedger, OrderLifecycleManager};
use points_ledger::config::{Config, load_config};
use points_ledger::infrastructure::accrual::HttpAccrualOracle;
use points_ledger::infrastructure::http::{AppState, create_router};
use points_ledger::infrastructure::persistence::TursoLedgerStore;
use points_ledger::observability::{MetricsConfig, init_metrics};
use points_ledger::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for the driver to finish its current cycle.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let _telemetry = init_telemetry();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting points ledger");

    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => load_config(Some(&path)),
        Err(_) => Config::from_env(),
    }
    .context("invalid configuration")?;
    log_config(&config);

    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        if let Err(e) = init_metrics(&MetricsConfig::with_addr(addr)) {
            tracing::warn!(error = %e, "Metrics exporter unavailable, continuing without it");
        }
    }

    let store = Arc::new(open_store(&config).await?);
    let oracle = Arc::new(
        HttpAccrualOracle::new(config.accrual.address.clone(), config.accrual.timeout())
            .context("failed to build accrual client")?,
    );

    let orders = Arc::new(OrderLifecycleManager::with_timeout(
        Arc::clone(&store),
        oracle,
        config.accrual.timeout(),
    ));
    let balances = Arc::new(BalanceLedger::new(Arc::clone(&store)));

    let shutdown = CancellationToken::new();

    let driver_handle = if config.reconciliation.enabled {
        let driver = Arc::new(ReconciliationDriver::new(
            Arc::clone(&store),
            Arc::clone(&orders),
            config.reconciliation.to_driver_config(),
        ));
        Some(driver.spawn(shutdown.clone()))
    } else {
        tracing::warn!("Reconciliation disabled; uploaded orders will not be scored");
        None
    };

    let app = create_router(AppState {
        orders,
        balances,
        gateway_secret: config.auth.gateway_secret().map(Arc::from),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let bind_address = config.server.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("HTTP server error")?;

    shutdown.cancel();
    if let Some(handle) = driver_handle {
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Reconciliation driver did not stop in time"
            );
        }
    }

    tracing::info!("Points ledger stopped");
    Ok(())
}

/// Open the ledger database. Failure here is fatal.
async fn open_store(config: &Config) -> anyhow::Result<TursoLedgerStore> {
    let uri = &config.persistence.database_uri;
    if !config.persistence.is_in_memory() {
        if let Some(parent) = std::path::Path::new(uri).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
    }
    TursoLedgerStore::open(uri)
        .await
        .with_context(|| format!("failed to open ledger database at {uri}"))
}

fn log_config(config: &Config) {
    tracing::info!(
        run_address = %config.server.run_address,
        database = %config.persistence.database_uri,
        accrual_address = %config.accrual.address,
        accrual_timeout_ms = config.accrual.timeout_ms,
        reconciliation_enabled = config.reconciliation.enabled,
        reconciliation_interval_ms = config.reconciliation.interval_ms,
        max_concurrency = config.reconciliation.max_concurrency,
        gateway_secret = config.auth.gateway_secret().is_some(),
        "Configuration loaded"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM, then cancel `shutdown`.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; the process could not be
/// stopped cleanly otherwise.
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }

    shutdown.cancel();
}
