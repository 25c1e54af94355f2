//! StoreHooks Dispatcher
//!
//! Receives entity change events over HTTP and fires the configured store
//! webhooks, recording every delivery in the hook history.
//! Supports hook/history storage in memory, SQLite or PostgreSQL.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SH_CONFIG` | - | Path to the TOML configuration file |
//! | `SH_ENABLED` | `true` | Global switch for all hooks |
//! | `SH_DEFAULT_STORE_ID` | `1` | Store id for entities without `store_id` |
//! | `SH_HTTP_CONNECT_TIMEOUT_MS` | `10000` | Hook connect timeout |
//! | `SH_HTTP_REQUEST_TIMEOUT_MS` | `30000` | Hook request timeout |
//! | `SH_DB_KIND` | `memory` | Storage: `memory`, `sqlite`, `postgres` |
//! | `SH_DB_URL` | - | Database connection URL (required for sqlite/postgres) |
//! | `SH_PORT` | `8080` | HTTP API port |
//! | `SH_LOG_JSON` | `false` | Emit JSON log lines |
//! | `RUST_LOG` | `info` | Log level |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sh_api::{create_router, AppState};
use sh_common::Hook;
use sh_config::{DatabaseKind, StoreHooksConfig};
use sh_hooks::postgres::{PostgresHistoryRepository, PostgresHookRepository};
use sh_hooks::sqlite::{SqliteHistoryRepository, SqliteHookRepository};
use sh_hooks::{
    HistoryRepository, HookDispatcher, HookDispatcherConfig, HookRepository, HttpDispatcher,
    HttpDispatcherConfig, InMemoryHistoryRepository, InMemoryHookRepository,
};

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;

/// StoreHooks Dispatcher
#[derive(Parser, Debug)]
#[command(name = "sh-dispatcher")]
#[command(about = "StoreHooks - fires outbound webhooks for store entity changes")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "SH_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP API port (overrides the configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long, env = "SH_LOG_JSON", default_value = "false")]
    log_json: bool,
}

struct Repositories {
    hooks: Arc<dyn HookRepository>,
    history: Arc<dyn HistoryRepository>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting StoreHooks Dispatcher");

    // Configuration
    let config = StoreHooksConfig::load_with_env(args.config.as_deref())?;
    let port = args.port.unwrap_or(config.server.port);

    if !config.general.enabled {
        info!("Hooks are disabled, events will be accepted but nothing is sent");
    }

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!("storehooks_deliveries_total", "Hook deliveries by outcome");

    let repos = create_repositories(&config).await?;
    info!("Repositories initialized ({:?})", config.database.kind);

    let transport = HttpDispatcher::new(HttpDispatcherConfig::from(&config.http))?;
    let dispatcher = HookDispatcher::new(
        HookDispatcherConfig::from(&config.general),
        repos.hooks,
        repos.history.clone(),
        Arc::new(transport),
    );

    let app = create_router(AppState {
        dispatcher: Arc::new(dispatcher),
        history: repos.history,
        metrics: Some(metrics_handle),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("StoreHooks API listening on http://{}", addr);
    info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("StoreHooks Dispatcher shutdown complete");
    Ok(())
}

async fn create_repositories(config: &StoreHooksConfig) -> Result<Repositories> {
    let url = config.database.url.as_deref();
    match config.database.kind {
        DatabaseKind::Memory => {
            info!(hooks = config.hooks.len(), "Using in-memory hooks and history");
            Ok(Repositories {
                hooks: Arc::new(InMemoryHookRepository::new(config.hooks.clone())),
                history: Arc::new(InMemoryHistoryRepository::new()),
            })
        }
        DatabaseKind::Sqlite => {
            let url = url.ok_or_else(|| anyhow::anyhow!("SH_DB_URL is required for sqlite"))?;
            let pool = SqlitePoolOptions::new()
                .max_connections(config.database.max_connections.unwrap_or(5))
                .connect(url)
                .await?;

            let hooks = SqliteHookRepository::new(pool.clone());
            hooks.init_schema().await?;
            for hook in &config.hooks {
                hooks.upsert(hook).await?;
            }
            log_seeded(&config.hooks);

            let history = SqliteHistoryRepository::new(pool);
            history.init_schema().await?;
            info!("Using SQLite storage: {}", url);
            Ok(Repositories { hooks: Arc::new(hooks), history: Arc::new(history) })
        }
        DatabaseKind::Postgres => {
            let url = url.ok_or_else(|| anyhow::anyhow!("SH_DB_URL is required for postgres"))?;
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections.unwrap_or(10))
                .connect(url)
                .await?;

            let hooks = PostgresHookRepository::new(pool.clone());
            hooks.init_schema().await?;
            for hook in &config.hooks {
                hooks.upsert(hook).await?;
            }
            log_seeded(&config.hooks);

            let history = PostgresHistoryRepository::new(pool);
            history.init_schema().await?;
            info!("Using PostgreSQL storage");
            Ok(Repositories { hooks: Arc::new(hooks), history: Arc::new(history) })
        }
    }
}

fn log_seeded(hooks: &[Hook]) {
    if !hooks.is_empty() {
        info!(count = hooks.len(), "Seeded hooks from configuration");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received...");
}
