//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state from `AppConfig`
//! - Create the Axum router with every route and middleware layer
//! - Serve with graceful shutdown
//! - Apply hot-reloaded configuration to live components
//!
//! # Middleware order (outermost first)
//! ```text
//! request id → trace → propagate request id → timing → security headers
//!     → CORS → rate limit → security pipeline → catch panic → timeout → handlers
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    http::{Method, StatusCode, Uri},
    middleware::from_fn_with_state,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::health::probe::{probe_from_config, CachedProbe, ProbeError};
use crate::http::middleware::timing_middleware;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{panic_response, ApiError};
use crate::lifecycle::{maintenance, Shutdown};
use crate::observability::{PerformanceMonitor, SystemSampler};
use crate::security::cors::cors_layer;
use crate::security::headers::security_headers_middleware;
use crate::security::middleware::security_middleware;
use crate::security::rate_limit::rate_limit_middleware;
use crate::security::{RateLimiter, SecurityGuard};
use crate::todos::{self, TodoStore};
use crate::health;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to compile request inspection rules: {0}")]
    Patterns(#[from] regex::Error),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<AppConfig>>,
    pub todos: Arc<TodoStore>,
    pub guard: Arc<SecurityGuard>,
    pub limiter: Arc<RateLimiter>,
    pub performance: Arc<PerformanceMonitor>,
    pub sampler: Arc<SystemSampler>,
    pub database: Arc<CachedProbe>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let todos = if config.todos.seed_samples {
            TodoStore::with_samples()
        } else {
            TodoStore::new()
        };
        let probe = probe_from_config(&config.database)?;

        Ok(Self {
            todos: Arc::new(todos),
            guard: Arc::new(SecurityGuard::new(config.security.clone())?),
            limiter: Arc::new(RateLimiter::new(config.security.rate_limit.clone())),
            performance: Arc::new(PerformanceMonitor::new(&config.performance)),
            sampler: Arc::new(SystemSampler::new()),
            database: Arc::new(CachedProbe::new(
                probe,
                Duration::from_secs(config.database.cache_secs),
            )),
            config: Arc::new(ArcSwap::from_pointee(config)),
            started_at: Instant::now(),
        })
    }

    /// Push a reloaded configuration into the running components.
    ///
    /// Listener address, timeouts, CORS max-age and the database probe are
    /// fixed at startup; everything else takes effect immediately.
    pub fn apply_config(&self, config: AppConfig) {
        if self.guard.policy().as_ref() != &config.security {
            self.guard.update_config(config.security.clone());
        }
        self.limiter.update_config(config.security.rate_limit.clone());
        self.performance
            .set_alert_thresholds(config.performance.thresholds);
        self.performance
            .set_max_history(config.performance.max_history);

        tracing::info!(
            environment = %config.environment,
            rate_limit = config.security.rate_limit.max_requests,
            "Configuration reloaded"
        );
        self.config.store(Arc::new(config));
    }
}

/// HTTP server for the todo API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let state = AppState::new(config)?;
        let router = build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Shared state, for the admin API and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires. Reloaded configurations
    /// arriving on `config_updates` are applied while running.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<AppConfig>>,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        maintenance::spawn_all(&self.state, shutdown);

        if let Some(mut updates) = config_updates {
            let state = self.state.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(config) => state.apply_config(config),
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            });
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// `Router::layer` wraps, so the last layer added runs first.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.load_full();
    let guard = state.guard.clone();

    Router::new()
        .merge(health::router())
        .nest("/api/todos", todos::router())
        .fallback(not_found)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(request_timeout(Duration::from_secs(config.timeouts.request_secs)))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(guard.clone(), security_middleware))
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit_middleware))
        .layer(cors_layer(guard.clone(), config.environment))
        .layer(from_fn_with_state(guard, security_headers_middleware))
        .layer(from_fn_with_state(state, timing_middleware))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// Requests still running after `limit` get an empty 408.
fn request_timeout(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} {} not found", method, uri.path()))
}
