//! IP reputation, suspicious-request detection and the audit trail.
//!
//! # Responsibilities
//! - Track failed attempts per IP and block at the threshold
//! - Expire blocks lazily on lookup
//! - Record every security event in the bounded audit log
//! - Report audit pages, summaries and snapshots for the admin API
//!
//! # Design Decisions
//! - One mutex guards blocked, failed, activity and audit state so related
//!   updates are atomic together
//! - Policy lives in an `ArcSwap` and is replaced wholesale on reload
//! - Operations never fail; bad input is simply not matched

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, Uri};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::SecurityConfig;
use crate::observability::{logging, metrics};
use crate::security::audit::{AuditEvent, AuditLog, AuditPage, AuditQuery, SecuritySummary};
use crate::security::patterns::RequestInspector;

/// Activity counts below this are dropped by `cleanup`.
const MIN_TRACKED_ACTIVITY: u64 = 5;

/// Events returned by `snapshot`.
const SNAPSHOT_EVENTS: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedIp {
    pub blocked_at: DateTime<Utc>,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttempts {
    pub count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedIpView {
    pub ip: IpAddr,
    #[serde(flatten)]
    pub entry: BlockedIp,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttemptView {
    pub ip: IpAddr,
    #[serde(flatten)]
    pub entry: FailedAttempts,
}

/// Point-in-time view of the guard's state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySnapshot {
    #[serde(rename = "blockedIPs")]
    pub blocked_ips: usize,
    pub blocked: Vec<BlockedIpView>,
    pub failed_attempts: Vec<FailedAttemptView>,
    pub suspicious_activity: BTreeMap<String, u64>,
    pub audit_log_size: usize,
    pub recent_security_events: Vec<AuditEvent>,
}

#[derive(Default)]
struct SecurityState {
    blocked: HashMap<IpAddr, BlockedIp>,
    failed: HashMap<IpAddr, FailedAttempts>,
    activity: HashMap<IpAddr, u64>,
    audit: AuditLog,
}

/// Per-server security state. Created once at startup and shared via `Arc`.
pub struct SecurityGuard {
    policy: ArcSwap<SecurityConfig>,
    state: Mutex<SecurityState>,
    inspector: RequestInspector,
}

impl SecurityGuard {
    pub fn new(config: SecurityConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            policy: ArcSwap::from_pointee(config),
            state: Mutex::new(SecurityState::default()),
            inspector: RequestInspector::new()?,
        })
    }

    pub fn policy(&self) -> Arc<SecurityConfig> {
        self.policy.load_full()
    }

    pub fn inspector(&self) -> &RequestInspector {
        &self.inspector
    }

    /// Replace the policy and audit which sections changed.
    pub fn update_config(&self, new: SecurityConfig) {
        let old = self.policy.load_full();
        let mut updated = Vec::new();
        if old.enable_headers != new.enable_headers {
            updated.push("enable_headers");
        }
        if old.max_body_size != new.max_body_size {
            updated.push("max_body_size");
        }
        if old.ip_blocking != new.ip_blocking {
            updated.push("ip_blocking");
        }
        if old.audit != new.audit {
            updated.push("audit");
        }
        if old.rate_limit != new.rate_limit {
            updated.push("rate_limit");
        }
        if old.cors != new.cors {
            updated.push("cors");
        }
        if old.cleanup_interval_secs != new.cleanup_interval_secs {
            updated.push("cleanup_interval_secs");
        }

        self.policy.store(Arc::new(new));
        self.log_event(
            "security_config_updated",
            None,
            json!({ "updatedKeys": updated }),
        );
    }

    /// True iff a block exists and has not yet run for `block_duration`.
    pub fn is_ip_blocked(&self, ip: IpAddr) -> bool {
        self.is_ip_blocked_at(ip, Utc::now())
    }

    pub(crate) fn is_ip_blocked_at(&self, ip: IpAddr, now: DateTime<Utc>) -> bool {
        let duration = self.policy.load().ip_blocking.block_duration();
        let mut state = self.state.lock();
        let Some(entry) = state.blocked.get(&ip) else {
            return false;
        };

        let elapsed = (now - entry.blocked_at).to_std().unwrap_or_default();
        if elapsed < duration {
            return true;
        }

        state.blocked.remove(&ip);
        metrics::set_blocked_ips(state.blocked.len());
        false
    }

    /// Count a failed attempt; blocks the IP once the threshold is reached.
    pub fn record_failed_attempt(&self, ip: IpAddr, reason: &str) {
        let policy = self.policy.load_full();
        let max = policy.ip_blocking.max_failed_attempts;
        let now = Utc::now();

        let mut state = self.state.lock();
        let entry = state.failed.entry(ip).or_default();
        entry.count += 1;
        entry.last_attempt = Some(now);
        entry.reasons.push(reason.to_string());
        let count = entry.count;

        if count >= max {
            block_locked(&mut state, &policy, ip, "too_many_failed_attempts", now);
        }

        push_event(
            &mut state,
            &policy,
            "failed_attempt_recorded",
            Some(ip),
            json!({
                "reason": reason,
                "attemptCount": count,
                "maxAttempts": max,
            }),
            now,
        );
    }

    /// Block `ip` now, overwriting any existing block.
    pub fn block_ip(&self, ip: IpAddr, reason: &str) {
        let policy = self.policy.load_full();
        let mut state = self.state.lock();
        block_locked(&mut state, &policy, ip, reason, Utc::now());
    }

    /// Remove the block and failed-attempt history. Returns whether a block existed.
    pub fn unblock_ip(&self, ip: IpAddr) -> bool {
        let policy = self.policy.load_full();
        let mut state = self.state.lock();
        let was_blocked = state.blocked.remove(&ip).is_some();
        state.failed.remove(&ip);

        if was_blocked {
            let now = Utc::now();
            push_event(
                &mut state,
                &policy,
                "ip_unblocked",
                Some(ip),
                json!({ "unblockedAt": now }),
                now,
            );
            metrics::set_blocked_ips(state.blocked.len());
            tracing::info!(ip = %ip, "IP address unblocked");
        }
        was_blocked
    }

    pub fn is_suspicious_request(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        self.inspector.is_suspicious(uri, headers)
    }

    /// Append an event to the audit log.
    pub fn log_event(&self, event: &str, ip: Option<IpAddr>, details: Value) {
        let policy = self.policy.load_full();
        let mut state = self.state.lock();
        push_event(&mut state, &policy, event, ip, details, Utc::now());
    }

    pub fn audit_log(&self, query: &AuditQuery) -> AuditPage {
        let state = self.state.lock();
        let (total, entries) = state.audit.query(query);
        let summary = state
            .audit
            .summarize(Utc::now(), state.blocked.len(), state.failed.len());
        AuditPage {
            total,
            entries,
            summary,
        }
    }

    pub fn summary(&self) -> SecuritySummary {
        let state = self.state.lock();
        state
            .audit
            .summarize(Utc::now(), state.blocked.len(), state.failed.len())
    }

    /// Purge data older than the retention window and low-activity IPs.
    pub fn cleanup(&self) {
        self.cleanup_at(Utc::now());
    }

    pub(crate) fn cleanup_at(&self, now: DateTime<Utc>) {
        let policy = self.policy.load_full();
        let retention = chrono::Duration::from_std(policy.ip_blocking.retention())
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let cutoff = now - retention;
        let block_duration = policy.ip_blocking.block_duration();

        let mut state = self.state.lock();
        state.audit.retain_after(cutoff);
        state
            .failed
            .retain(|_, f| f.last_attempt.map_or(false, |at| at >= cutoff));
        state
            .activity
            .retain(|_, count| *count >= MIN_TRACKED_ACTIVITY);
        state.blocked.retain(|_, b| {
            (now - b.blocked_at).to_std().unwrap_or_default() < block_duration
        });
        metrics::set_blocked_ips(state.blocked.len());

        let details = json!({
            "auditLogSize": state.audit.len(),
            "failedAttemptsCount": state.failed.len(),
            "suspiciousActivityCount": state.activity.len(),
        });
        push_event(
            &mut state,
            &policy,
            "security_cleanup_completed",
            None,
            details,
            now,
        );
    }

    pub fn snapshot(&self) -> SecuritySnapshot {
        let state = self.state.lock();
        let mut blocked: Vec<BlockedIpView> = state
            .blocked
            .iter()
            .map(|(ip, entry)| BlockedIpView {
                ip: *ip,
                entry: entry.clone(),
            })
            .collect();
        blocked.sort_by_key(|b| b.ip);

        let mut failed_attempts: Vec<FailedAttemptView> = state
            .failed
            .iter()
            .map(|(ip, entry)| FailedAttemptView {
                ip: *ip,
                entry: entry.clone(),
            })
            .collect();
        failed_attempts.sort_by_key(|f| f.ip);

        SecuritySnapshot {
            blocked_ips: state.blocked.len(),
            blocked,
            failed_attempts,
            suspicious_activity: state
                .activity
                .iter()
                .map(|(ip, n)| (ip.to_string(), *n))
                .collect(),
            audit_log_size: state.audit.len(),
            recent_security_events: state.audit.recent(SNAPSHOT_EVENTS),
        }
    }
}

fn block_locked(
    state: &mut SecurityState,
    policy: &SecurityConfig,
    ip: IpAddr,
    reason: &str,
    now: DateTime<Utc>,
) {
    let attempts = state.failed.get(&ip).map_or(0, |f| f.count);
    state.blocked.insert(
        ip,
        BlockedIp {
            blocked_at: now,
            reason: reason.to_string(),
            attempts,
        },
    );
    metrics::set_blocked_ips(state.blocked.len());

    push_event(
        state,
        policy,
        "ip_blocked",
        Some(ip),
        json!({
            "reason": reason,
            "blockedAt": now,
            "attempts": attempts,
        }),
        now,
    );
    tracing::warn!(ip = %ip, reason = %reason, "IP address blocked");
}

fn push_event(
    state: &mut SecurityState,
    policy: &SecurityConfig,
    event: &str,
    ip: Option<IpAddr>,
    details: Value,
    now: DateTime<Utc>,
) {
    let details = match details {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("details".into(), other);
            map
        }
    };

    logging::security(event, ip, &Value::Object(details.clone()));
    metrics::record_security_event(event);

    if let Some(ip) = ip {
        *state.activity.entry(ip).or_insert(0) += 1;
    }

    state.audit.push(
        AuditEvent {
            event: event.to_string(),
            timestamp: now,
            ip,
            details,
        },
        &policy.audit,
    );
}
