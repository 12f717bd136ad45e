//! Todo API backend.
//!
//! # Startup order
//! 1. Configuration: TOML file from `TODO_CONFIG` or the first argument,
//!    environment overrides, validation
//! 2. Logging (daily files + console) and the Prometheus exporter
//! 3. Shared state, HTTP listener, optional admin listener
//! 4. Config watcher, then wait for SIGINT/SIGTERM

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use todo_backend::admin::setup_admin_router;
use todo_backend::config::{load_startup_config, watcher::ConfigWatcher};
use todo_backend::lifecycle::{wait_for_shutdown, Shutdown};
use todo_backend::observability::{logging, metrics};
use todo_backend::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var_os("TODO_CONFIG")
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from));

    let config = load_startup_config(config_path.as_deref())?;
    let _log_guards = logging::init(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        config_file = ?config_path,
        "todo-backend starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit = config.security.rate_limit.max_requests,
        rate_window_ms = config.security.rate_limit.window_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let admin = config.admin.clone();
    let server = HttpServer::new(config)?;
    let shutdown = Arc::new(Shutdown::new());

    if admin.enabled {
        let admin_listener = TcpListener::bind(&admin.bind_address).await?;
        tracing::info!(address = %admin.bind_address, "Admin API listening");
        let app = setup_admin_router(server.state().clone())
            .into_make_service_with_connect_info::<std::net::SocketAddr>();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
    }

    // The watcher stops delivering updates once dropped.
    let (_watcher, config_updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), Some(updates)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        signal_shutdown.trigger();
    });

    server.run(listener, config_updates, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
