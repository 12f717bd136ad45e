//! In-process performance sampler.
//!
//! # Responsibilities
//! - Time operations and HTTP requests
//! - Keep bounded histories of timers, responses, custom metrics, system samples and errors
//! - Aggregate statistics (average, median, p95, p99) and raise alerts
//!
//! # Design Decisions
//! - One mutex guards all histories; every write evicts by age then by count
//! - Statistics are computed on demand from the retained window
//! - Durations come from the monotonic clock, timestamps from the wall clock

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::config::{AlertThresholds, PerformanceConfig};
use crate::observability::logging;
use crate::observability::system::SystemSnapshot;

/// Window used by `check_alerts`.
const ALERT_WINDOW: Duration = Duration::from_secs(5 * 60);

struct ActiveTimer {
    operation: String,
    started: Instant,
    metadata: Value,
    timestamp: DateTime<Utc>,
}

/// A finished timer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTimer {
    pub id: String,
    pub operation: String,
    /// Milliseconds, rounded to two decimals.
    pub duration: f64,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetric {
    pub name: String,
    pub value: f64,
    pub tags: Value,
    pub timestamp: DateTime<Utc>,
}

/// Input for `record_response_time`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub response_time: f64,
    pub user_agent: Option<String>,
    pub ip: Option<IpAddr>,
}

/// Input for `record_error`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub code: Option<String>,
    pub operation: Option<String>,
    pub ip: Option<IpAddr>,
}

#[derive(Debug, Clone)]
struct Stamped<T> {
    inner: T,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerStats {
    pub operation: String,
    pub count: usize,
    pub total: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStats {
    pub count: usize,
    pub error_count: usize,
    pub error_rate: f64,
    pub status_codes: BTreeMap<u16, usize>,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}

/// Payload of the performance report endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub timers: Vec<TimerStats>,
    pub responses: ResponseStats,
    pub system: Option<SystemSnapshot>,
    pub alerts: Vec<Alert>,
    pub active_timers: usize,
    pub custom_metrics: usize,
    pub errors: usize,
}

#[derive(Default)]
struct Histories {
    timers: VecDeque<CompletedTimer>,
    responses: VecDeque<Stamped<ResponseRecord>>,
    custom: VecDeque<CustomMetric>,
    system: VecDeque<SystemSnapshot>,
    errors: VecDeque<Stamped<ErrorRecord>>,
}

struct MonitorState {
    active: HashMap<String, ActiveTimer>,
    history: Histories,
    max_history: usize,
    max_age: Duration,
    thresholds: AlertThresholds,
}

/// Performance sampler shared by the request pipeline and the admin API.
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(config: &PerformanceConfig) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                active: HashMap::new(),
                history: Histories::default(),
                max_history: config.max_history,
                max_age: config.max_age(),
                thresholds: config.thresholds,
            }),
        }
    }

    /// Start timing `operation`. Returns the timer id.
    pub fn start_timer(&self, operation: &str, metadata: Value) -> String {
        let id = format!(
            "timer_{}_{}",
            Utc::now().timestamp_millis(),
            fastrand::u64(..)
        );
        self.state.lock().active.insert(
            id.clone(),
            ActiveTimer {
                operation: operation.to_string(),
                started: Instant::now(),
                metadata,
                timestamp: Utc::now(),
            },
        );
        id
    }

    /// Stop a timer and move it to the history.
    ///
    /// Unknown ids log a warning and yield `None`.
    pub fn end_timer(&self, id: &str, extra: Value) -> Option<CompletedTimer> {
        let mut state = self.state.lock();
        let Some(timer) = state.active.remove(id) else {
            drop(state);
            tracing::warn!(timer_id = %id, "Attempted to end non-existent timer");
            return None;
        };

        let elapsed_ms = timer.started.elapsed().as_secs_f64() * 1000.0;
        let completed = CompletedTimer {
            id: id.to_string(),
            operation: timer.operation,
            duration: round2(elapsed_ms),
            metadata: merge(timer.metadata, extra),
            timestamp: timer.timestamp,
        };

        let slow = elapsed_ms > state.thresholds.response_time_ms;
        state.history.timers.push_back(completed.clone());
        state.evict(Utc::now());
        drop(state);

        if slow {
            logging::performance(&completed.operation, completed.duration);
        }
        Some(completed)
    }

    pub fn record_metric(&self, name: &str, value: f64, tags: Value) {
        let mut state = self.state.lock();
        state.history.custom.push_back(CustomMetric {
            name: name.to_string(),
            value,
            tags,
            timestamp: Utc::now(),
        });
        state.evict(Utc::now());
    }

    pub fn record_response_time(&self, record: ResponseRecord) {
        let mut state = self.state.lock();
        let threshold = state.thresholds.response_time_ms;
        if record.response_time > threshold {
            tracing::warn!(
                method = %record.method,
                url = %record.url,
                response_time_ms = record.response_time,
                status = record.status_code,
                "Slow HTTP response detected"
            );
        }
        state.history.responses.push_back(Stamped {
            inner: record,
            timestamp: Utc::now(),
        });
        state.evict(Utc::now());
    }

    /// Store a system sample and log memory or CPU pressure.
    pub fn record_system_metrics(&self, snapshot: SystemSnapshot) {
        let mut state = self.state.lock();
        let thresholds = state.thresholds;
        if snapshot.memory.percentage > thresholds.memory_usage {
            tracing::warn!(
                usage = snapshot.memory.percentage,
                threshold = thresholds.memory_usage,
                "High memory usage detected"
            );
        }
        if snapshot.cpu.usage > thresholds.cpu_usage {
            tracing::warn!(
                usage = snapshot.cpu.usage,
                threshold = thresholds.cpu_usage,
                "High CPU usage detected"
            );
        }
        state.history.system.push_back(snapshot);
        state.evict(Utc::now());
    }

    pub fn record_error(&self, record: ErrorRecord) {
        let mut state = self.state.lock();
        state.history.errors.push_back(Stamped {
            inner: record,
            timestamp: Utc::now(),
        });
        state.evict(Utc::now());
    }

    /// Statistics for one timed operation, `None` if it never completed.
    pub fn timer_stats(&self, operation: &str) -> Option<TimerStats> {
        let state = self.state.lock();
        timer_stats_locked(&state.history, operation)
    }

    pub fn response_stats(&self) -> ResponseStats {
        let state = self.state.lock();
        let responses = &state.history.responses;
        if responses.is_empty() {
            return ResponseStats::default();
        }

        let mut status_codes = BTreeMap::new();
        for r in responses {
            *status_codes.entry(r.inner.status_code).or_insert(0) += 1;
        }
        let error_count = status_codes
            .iter()
            .filter(|(code, _)| **code >= 400)
            .map(|(_, n)| n)
            .sum::<usize>();

        let times: Vec<f64> = responses.iter().map(|r| r.inner.response_time).collect();
        let summary = Summary::of(times);

        ResponseStats {
            count: summary.count,
            error_count,
            error_rate: error_count as f64 / summary.count as f64,
            status_codes,
            average: summary.average,
            min: summary.min,
            max: summary.max,
            median: summary.median,
            p95: summary.p95,
            p99: summary.p99,
        }
    }

    /// Alerts over the last five minutes of responses and errors.
    pub fn check_alerts(&self) -> Vec<Alert> {
        let state = self.state.lock();
        check_alerts_locked(&state, Utc::now())
    }

    pub fn active_timers(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn report(&self) -> PerformanceReport {
        let responses = self.response_stats();
        let state = self.state.lock();

        let mut operations: Vec<&str> = Vec::new();
        for t in &state.history.timers {
            if !operations.contains(&t.operation.as_str()) {
                operations.push(&t.operation);
            }
        }
        let timers = operations
            .into_iter()
            .filter_map(|op| timer_stats_locked(&state.history, op))
            .collect();

        PerformanceReport {
            timestamp: Utc::now(),
            timers,
            responses,
            system: state.history.system.back().cloned(),
            alerts: check_alerts_locked(&state, Utc::now()),
            active_timers: state.active.len(),
            custom_metrics: state.history.custom.len(),
            errors: state.history.errors.len(),
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.state.lock().thresholds
    }

    pub fn set_alert_thresholds(&self, thresholds: AlertThresholds) {
        self.state.lock().thresholds = thresholds;
    }

    /// Change the per-stream cap and evict immediately.
    pub fn set_max_history(&self, max_history: usize) {
        let mut state = self.state.lock();
        state.max_history = max_history;
        state.evict(Utc::now());
    }

    /// Periodic eviction pass.
    pub fn cleanup(&self) {
        self.state.lock().evict(Utc::now());
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.active.clear();
        state.history = Histories::default();
    }
}

impl MonitorState {
    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = chrono::Duration::from_std(self.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));
        let cap = self.max_history;

        trim(&mut self.history.timers, cap, cutoff, |t| t.timestamp);
        trim(&mut self.history.responses, cap, cutoff, |r| r.timestamp);
        trim(&mut self.history.custom, cap, cutoff, |m| m.timestamp);
        trim(&mut self.history.system, cap, cutoff, |s| s.timestamp);
        trim(&mut self.history.errors, cap, cutoff, |e| e.timestamp);
    }
}

fn trim<T>(
    items: &mut VecDeque<T>,
    cap: usize,
    cutoff: Option<DateTime<Utc>>,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) {
    if let Some(cutoff) = cutoff {
        items.retain(|item| timestamp(item) > cutoff);
    }
    while items.len() > cap {
        items.pop_front();
    }
}

fn timer_stats_locked(history: &Histories, operation: &str) -> Option<TimerStats> {
    let durations: Vec<f64> = history
        .timers
        .iter()
        .filter(|t| t.operation == operation)
        .map(|t| t.duration)
        .collect();
    if durations.is_empty() {
        return None;
    }
    let summary = Summary::of(durations);
    Some(TimerStats {
        operation: operation.to_string(),
        count: summary.count,
        total: summary.total,
        average: summary.average,
        min: summary.min,
        max: summary.max,
        median: summary.median,
        p95: summary.p95,
        p99: summary.p99,
    })
}

fn check_alerts_locked(state: &MonitorState, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let since = now - chrono::Duration::seconds(ALERT_WINDOW.as_secs() as i64);

    let recent: Vec<f64> = state
        .history
        .responses
        .iter()
        .filter(|r| r.timestamp > since)
        .map(|r| r.inner.response_time)
        .collect();
    if recent.is_empty() {
        return alerts;
    }

    let thresholds = state.thresholds;
    let average = recent.iter().sum::<f64>() / recent.len() as f64;
    if average > thresholds.response_time_ms {
        alerts.push(Alert {
            kind: "slow_response_time",
            severity: Severity::Warning,
            message: format!("Average response time ({:.2}ms) exceeds threshold", average),
            value: average,
            threshold: thresholds.response_time_ms,
        });
    }

    let recent_errors = state
        .history
        .errors
        .iter()
        .filter(|e| e.timestamp > since)
        .count();
    let error_rate = recent_errors as f64 / recent.len() as f64;
    if error_rate > thresholds.error_rate {
        alerts.push(Alert {
            kind: "high_error_rate",
            severity: Severity::Critical,
            message: format!("Error rate ({:.2}%) exceeds threshold", error_rate * 100.0),
            value: error_rate,
            threshold: thresholds.error_rate,
        });
    }

    alerts
}

struct Summary {
    count: usize,
    total: f64,
    average: f64,
    min: f64,
    max: f64,
    median: f64,
    p95: f64,
    p99: f64,
}

impl Summary {
    /// `values` must be non-empty.
    fn of(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        let count = values.len();
        let total: f64 = values.iter().sum();
        Self {
            count,
            total,
            average: total / count as f64,
            min: values[0],
            max: values[count - 1],
            median: median(&values),
            p95: percentile(&values, 95.0),
            p99: percentile(&values, 99.0),
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1)]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn merge(base: Value, extra: Value) -> Value {
    match (base, extra) {
        (Value::Object(mut a), Value::Object(b)) => {
            a.extend(b);
            Value::Object(a)
        }
        (base, Value::Null) => base,
        (Value::Null, extra) => extra,
        (base, _) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(&PerformanceConfig::default())
    }

    fn response(status: u16, ms: f64) -> ResponseRecord {
        ResponseRecord {
            method: "GET".into(),
            url: "/api/todos".into(),
            status_code: status,
            response_time: ms,
            user_agent: None,
            ip: None,
        }
    }

    #[test]
    fn timer_round_trip_merges_metadata() {
        let monitor = monitor();
        let id = monitor.start_timer("db.query", json!({"collection": "todos"}));
        assert!(id.starts_with("timer_"));
        assert_eq!(monitor.active_timers(), 1);

        let done = monitor.end_timer(&id, json!({"rows": 3})).unwrap();
        assert_eq!(done.operation, "db.query");
        assert_eq!(done.metadata, json!({"collection": "todos", "rows": 3}));
        assert!(done.duration >= 0.0);
        assert_eq!(monitor.active_timers(), 0);

        let stats = monitor.timer_stats("db.query").unwrap();
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn ending_unknown_timer_yields_none() {
        assert!(monitor().end_timer("timer_0_0", Value::Null).is_none());
    }

    #[test]
    fn response_stats_use_nearest_rank() {
        let monitor = monitor();
        for (i, status) in [200, 200, 404, 500].iter().enumerate() {
            monitor.record_response_time(response(*status, (i + 1) as f64 * 10.0));
        }

        let stats = monitor.response_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.error_rate, 0.5);
        assert_eq!(stats.status_codes.get(&200), Some(&2));
        assert_eq!(stats.average, 25.0);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.p95, 40.0);
        assert_eq!(stats.p99, 40.0);
    }

    #[test]
    fn empty_response_stats_are_zero() {
        assert_eq!(monitor().response_stats(), ResponseStats::default());
    }

    #[test]
    fn history_is_capped_fifo() {
        let monitor = monitor();
        monitor.set_max_history(3);
        for i in 0..5 {
            monitor.record_metric("queue", i as f64, Value::Null);
        }
        let state = monitor.state.lock();
        let values: Vec<f64> = state.history.custom.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn alerts_fire_on_slow_and_failing_traffic() {
        let monitor = monitor();
        monitor.record_response_time(response(500, 3000.0));
        monitor.record_error(ErrorRecord {
            message: "boom".into(),
            code: None,
            operation: None,
            ip: None,
        });

        let kinds: Vec<_> = monitor.check_alerts().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["slow_response_time", "high_error_rate"]);

        monitor.set_alert_thresholds(AlertThresholds {
            response_time_ms: 5000.0,
            error_rate: 1.0,
            ..AlertThresholds::default()
        });
        assert!(monitor.check_alerts().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let monitor = monitor();
        monitor.start_timer("x", Value::Null);
        monitor.record_response_time(response(200, 1.0));
        monitor.reset();
        let report = monitor.report();
        assert_eq!(report.active_timers, 0);
        assert_eq!(report.responses.count, 0);
    }
}
