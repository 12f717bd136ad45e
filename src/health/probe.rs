//! Database dependency probes.
//!
//! # Responsibilities
//! - Report whether the backing database is reachable
//! - Cache results so health endpoints don't hammer the dependency
//!
//! # Design Decisions
//! - The simulated probe always reports connected; the store is in memory
//! - The TCP probe only checks that the URI's host accepts connections
//! - A failed probe is a status, not an error; callers never see `Err`

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;
use url::Url;

use crate::config::{DatabaseConfig, ProbeMode};
use crate::observability::logging;

const MONGODB_DEFAULT_PORT: u16 = 27017;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid database URI: {0}")]
    InvalidUri(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub status: DbStatus,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn is_connected(&self) -> bool {
        self.status == DbStatus::Connected
    }
}

/// A reachability check against one dependency.
pub trait DependencyProbe: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self) -> BoxFuture<'_, Result<(), ProbeError>>;
}

/// Always connected.
pub struct SimulatedProbe;

impl DependencyProbe for SimulatedProbe {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn check(&self) -> BoxFuture<'_, Result<(), ProbeError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Races a TCP connect to the database host against a timeout.
pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    /// Resolve `host:port` from a connection string such as
    /// `mongodb://user:pw@db.internal:27017/todos`.
    pub fn from_uri(uri: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let parsed = Url::parse(uri).map_err(|e| ProbeError::InvalidUri(e.to_string()))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProbeError::InvalidUri(format!("{} has no host", uri)))?;
        let port = parsed.port().unwrap_or(MONGODB_DEFAULT_PORT);
        Ok(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl DependencyProbe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn check(&self) -> BoxFuture<'_, Result<(), ProbeError>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(e)) => Err(ProbeError::Io(e)),
                Err(_) => Err(ProbeError::Timeout(self.timeout)),
            }
        })
    }
}

/// Build the probe selected by `database.probe`.
pub fn probe_from_config(config: &DatabaseConfig) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
    Ok(match config.probe {
        ProbeMode::Simulated => Arc::new(SimulatedProbe),
        ProbeMode::Tcp => Arc::new(TcpProbe::from_uri(
            &config.uri,
            Duration::from_millis(config.probe_timeout_ms),
        )?),
    })
}

/// Reuses the last probe result while it is younger than `ttl`.
pub struct CachedProbe {
    probe: Arc<dyn DependencyProbe>,
    ttl: Duration,
    last: Mutex<Option<(Instant, ProbeResult)>>,
}

impl CachedProbe {
    pub fn new(probe: Arc<dyn DependencyProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            last: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> ProbeResult {
        let fresh = self
            .last
            .lock()
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, result)| result.clone());
        if let Some(result) = fresh {
            return result;
        }

        let started = Instant::now();
        let outcome = self.probe.check().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        logging::database("ping", self.probe.name(), elapsed_ms);

        let result = match outcome {
            Ok(()) => ProbeResult {
                status: DbStatus::Connected,
                last_check: Utc::now(),
                error: None,
            },
            Err(e) => {
                tracing::error!(
                    category = "health",
                    probe = self.probe.name(),
                    error = %e,
                    "Database health check failed"
                );
                ProbeResult {
                    status: DbStatus::Disconnected,
                    last_check: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        };

        *self.last.lock() = Some((Instant::now(), result.clone()));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe(AtomicUsize);

    impl DependencyProbe for CountingProbe {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn check(&self) -> BoxFuture<'_, Result<(), ProbeError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn tcp_probe_parses_mongodb_uri() {
        let timeout = Duration::from_secs(1);
        let probe = TcpProbe::from_uri("mongodb://user:pw@db.internal:27018/todos", timeout).unwrap();
        assert_eq!(probe.target(), "db.internal:27018");

        let probe = TcpProbe::from_uri("mongodb://localhost/todo_dev", timeout).unwrap();
        assert_eq!(probe.target(), "localhost:27017");

        assert!(TcpProbe::from_uri("not a uri", timeout).is_err());
    }

    #[tokio::test]
    async fn results_are_cached_within_ttl() {
        let counting = Arc::new(CountingProbe(AtomicUsize::new(0)));
        let cached = CachedProbe::new(counting.clone(), Duration::from_secs(30));

        assert!(cached.status().await.is_connected());
        assert!(cached.status().await.is_connected());
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);

        let uncached = CachedProbe::new(counting.clone(), Duration::ZERO);
        uncached.status().await;
        uncached.status().await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_host_reports_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = Arc::new(TcpProbe::new(addr.to_string(), Duration::from_millis(500)));
        let result = CachedProbe::new(probe, Duration::from_secs(30)).status().await;
        assert_eq!(result.status, DbStatus::Disconnected);
        assert!(result.error.is_some());
    }
}
