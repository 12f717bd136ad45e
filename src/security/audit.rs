//! Bounded security audit log.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AuditConfig;

/// One recorded security event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Filters for `SecurityGuard::audit_log`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub event: Option<String>,
    pub ip: Option<IpAddr>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub total: usize,
    pub entries: Vec<AuditEvent>,
    pub summary: SecuritySummary,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpCount {
    pub ip: IpAddr,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySummary {
    pub total_events: usize,
    pub events_last_hour: usize,
    #[serde(rename = "blockedIPs")]
    pub blocked_ips: usize,
    pub failed_attempts: usize,
    pub events_by_type: BTreeMap<String, usize>,
    #[serde(rename = "topIPs")]
    pub top_ips: Vec<IpCount>,
    pub generated_at: DateTime<Utc>,
}

/// FIFO event store; overflow past `max_entries` keeps the newest `retain_entries`.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEvent>,
}

impl AuditLog {
    pub fn push(&mut self, event: AuditEvent, bounds: &AuditConfig) {
        self.entries.push_back(event);
        if self.entries.len() > bounds.max_entries {
            let excess = self.entries.len() - bounds.retain_entries.min(bounds.max_entries);
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<AuditEvent> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Drop events at or before `cutoff`.
    pub fn retain_after(&mut self, cutoff: DateTime<Utc>) {
        self.entries.retain(|e| e.timestamp > cutoff);
    }

    /// Filter, sort newest first, then paginate. Returns `(total, page)`.
    pub fn query(&self, query: &AuditQuery) -> (usize, Vec<AuditEvent>) {
        let mut matched: Vec<&AuditEvent> = self
            .entries
            .iter()
            .filter(|e| query.event.as_deref().map_or(true, |ev| e.event == ev))
            .filter(|e| query.ip.map_or(true, |ip| e.ip == Some(ip)))
            .filter(|e| query.start_date.map_or(true, |start| e.timestamp >= start))
            .filter(|e| query.end_date.map_or(true, |end| e.timestamp <= end))
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(100))
            .cloned()
            .collect();
        (total, page)
    }

    /// Aggregate the last 24 hours.
    pub fn summarize(
        &self,
        now: DateTime<Utc>,
        blocked_ips: usize,
        failed_attempts: usize,
    ) -> SecuritySummary {
        let day_ago = now - Duration::hours(24);
        let hour_ago = now - Duration::hours(1);

        let mut total_events = 0;
        let mut events_last_hour = 0;
        let mut events_by_type = BTreeMap::new();
        let mut per_ip: HashMap<IpAddr, usize> = HashMap::new();

        for event in self.entries.iter().filter(|e| e.timestamp > day_ago) {
            total_events += 1;
            if event.timestamp > hour_ago {
                events_last_hour += 1;
            }
            *events_by_type.entry(event.event.clone()).or_insert(0) += 1;
            if let Some(ip) = event.ip {
                *per_ip.entry(ip).or_insert(0) += 1;
            }
        }

        let mut top_ips: Vec<IpCount> = per_ip
            .into_iter()
            .map(|(ip, count)| IpCount { ip, count })
            .collect();
        top_ips.sort_by(|a, b| b.count.cmp(&a.count).then(a.ip.cmp(&b.ip)));
        top_ips.truncate(10);

        SecuritySummary {
            total_events,
            events_last_hour,
            blocked_ips,
            failed_attempts,
            events_by_type,
            top_ips,
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, ip: Option<&str>, at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            event: name.to_string(),
            timestamp: at,
            ip: ip.map(|s| s.parse().unwrap()),
            details: Map::new(),
        }
    }

    #[test]
    fn overflow_keeps_most_recent_entries() {
        let bounds = AuditConfig::default();
        let mut log = AuditLog::default();
        let now = Utc::now();
        for i in 0..=10_000 {
            let mut e = event("request_started", None, now);
            e.details.insert("seq".into(), Value::from(i));
            log.push(e, &bounds);
        }

        assert_eq!(log.len(), 5_000);
        let recent = log.recent(5_000);
        assert_eq!(recent[0].details["seq"], 5_001);
        assert_eq!(recent[4_999].details["seq"], 10_000);
    }

    #[test]
    fn never_exceeds_cap() {
        let bounds = AuditConfig {
            max_entries: 10,
            retain_entries: 4,
        };
        let mut log = AuditLog::default();
        for _ in 0..37 {
            log.push(event("x", None, Utc::now()), &bounds);
            assert!(log.len() <= 10);
        }
    }

    #[test]
    fn query_filters_sorts_and_paginates() {
        let mut log = AuditLog::default();
        let bounds = AuditConfig::default();
        let base = Utc::now() - Duration::minutes(10);
        for i in 0..5 {
            let ip = if i % 2 == 0 { "10.0.0.1" } else { "10.0.0.2" };
            log.push(event("ip_blocked", Some(ip), base + Duration::minutes(i)), &bounds);
        }
        log.push(event("request_started", Some("10.0.0.1"), base), &bounds);

        let (total, page) = log.query(&AuditQuery {
            event: Some("ip_blocked".into()),
            ip: Some("10.0.0.1".parse().unwrap()),
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page[0].timestamp > page[1].timestamp);

        let (total, _) = log.query(&AuditQuery {
            start_date: Some(base + Duration::minutes(3)),
            ..Default::default()
        });
        assert_eq!(total, 2);
    }

    #[test]
    fn summary_counts_windows_and_top_ips() {
        let mut log = AuditLog::default();
        let bounds = AuditConfig::default();
        let now = Utc::now();
        log.push(event("old", Some("10.0.0.9"), now - Duration::hours(30)), &bounds);
        log.push(event("a", Some("10.0.0.1"), now - Duration::hours(2)), &bounds);
        log.push(event("a", Some("10.0.0.1"), now - Duration::minutes(5)), &bounds);
        log.push(event("b", Some("10.0.0.2"), now - Duration::minutes(1)), &bounds);

        let summary = log.summarize(now, 1, 2);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.events_last_hour, 2);
        assert_eq!(summary.events_by_type.get("a"), Some(&2));
        assert_eq!(summary.top_ips[0].count, 2);
        assert_eq!(summary.blocked_ips, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("blockedIPs").is_some());
        assert!(json.get("topIPs").is_some());
    }
}
