//! Fixed-window rate limiting per client IP.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::observability::{logging, metrics};

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// A counting window for one client.
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window closes.
    pub reset_secs: u64,
}

/// State for the rate limiter.
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    config: ArcSwap<RateLimitConfig>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config: ArcSwap::from_pointee(config),
        }
    }

    pub fn config(&self) -> Arc<RateLimitConfig> {
        self.config.load_full()
    }

    /// Swap limits. Existing windows keep their start time.
    pub fn update_config(&self, config: RateLimitConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now())
    }

    pub(crate) fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let config = self.config.load();
        let window_len = config.window();
        let limit = config.max_requests;

        let mut window = self.windows.entry(ip).or_insert_with(|| Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }

        let reset = window_len.saturating_sub(now.saturating_duration_since(window.started));
        let allowed = window.count < limit;
        if allowed {
            window.count += 1;
        }

        Decision {
            allowed,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_secs: ceil_secs(reset),
        }
    }

    /// Drop windows that have already closed. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub(crate) fn prune_at(&self, now: Instant) -> usize {
        let window_len = self.config.load().window();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window_len);
        before - self.windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Middleware function for per-IP rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.config().enabled {
        return next.run(request).await;
    }

    let ip = request.client_ip();
    let decision = limiter.check(ip);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        logging::security(
            "rate_limit_exceeded",
            Some(ip),
            &json!({
                "userAgent": request
                    .headers()
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok()),
                "url": request.uri().to_string(),
                "method": request.method().as_str(),
            }),
        );
        metrics::record_rate_limited();

        let window_secs = limiter.config().window().as_secs();
        let mut response = ApiError::RateLimited {
            retry_after_secs: window_secs,
        }
        .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(decision.reset_secs));
        response
    };

    let headers = response.headers_mut();
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(decision.reset_secs));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            window_ms: 1000,
            max_requests: max,
        })
    }

    #[test]
    fn limits_within_window_and_resets() {
        let limiter = limiter(3);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let t0 = Instant::now();

        let remaining: Vec<u32> = (0..3).map(|_| limiter.check_at(ip, t0).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.check_at(ip, t0);
        assert!(!denied.allowed);
        assert_eq!(denied.reset_secs, 1);

        let next_window = limiter.check_at(ip, t0 + Duration::from_millis(1000));
        assert!(next_window.allowed);
        assert_eq!(next_window.remaining, 2);
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at("10.0.0.1".parse().unwrap(), now).allowed);
        assert!(limiter.check_at("10.0.0.2".parse().unwrap(), now).allowed);
        assert!(!limiter.check_at("10.0.0.1".parse().unwrap(), now).allowed);
    }

    #[test]
    fn prune_removes_closed_windows() {
        let limiter = limiter(5);
        let now = Instant::now();
        limiter.check_at("10.0.0.1".parse().unwrap(), now);
        assert_eq!(limiter.prune_at(now), 0);
        assert_eq!(limiter.prune_at(now + Duration::from_secs(2)), 1);
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
