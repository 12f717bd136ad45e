//! Background maintenance loops.
//!
//! # Responsibilities
//! - Security cleanup (stale failures, expired blocks, old audit entries)
//! - Performance history eviction
//! - Periodic system resource sampling
//! - Pruning closed rate-limit windows
//!
//! # Design Decisions
//! - One task per loop, each stopping on the shutdown broadcast
//! - Periods are read once at startup; reloads change policy, not schedules
//! - The first tick is skipped so nothing runs during startup

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::http::server::AppState;
use crate::lifecycle::Shutdown;

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Start every maintenance loop for `state`.
pub fn spawn_all(state: &AppState, shutdown: &Shutdown) {
    let config = state.config.load_full();

    let guard = state.guard.clone();
    spawn_periodic(
        "security_cleanup",
        Duration::from_secs(config.security.cleanup_interval_secs),
        shutdown.subscribe(),
        move || guard.cleanup(),
    );

    let performance = state.performance.clone();
    spawn_periodic(
        "performance_cleanup",
        Duration::from_secs(config.performance.cleanup_interval_secs),
        shutdown.subscribe(),
        move || performance.cleanup(),
    );

    let performance = state.performance.clone();
    let sampler = state.sampler.clone();
    spawn_periodic(
        "system_sampling",
        Duration::from_secs(config.performance.system_sample_interval_secs),
        shutdown.subscribe(),
        move || performance.record_system_metrics(sampler.sample()),
    );

    let limiter = state.limiter.clone();
    spawn_periodic(
        "rate_limit_prune",
        config.security.rate_limit.window(),
        shutdown.subscribe(),
        move || {
            let removed = limiter.prune();
            if removed > 0 {
                tracing::debug!(removed, "Pruned closed rate-limit windows");
            }
        },
    );
}

/// Run `task` every `period` until shutdown.
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut task: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        tracing::debug!(task = name, period_secs = period.as_secs(), "Maintenance task starting");
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => task(),
                _ = shutdown.recv() => {
                    tracing::debug!(task = name, "Maintenance task stopping");
                    break;
                }
            }
        }
    })
}
