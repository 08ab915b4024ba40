//! In-process metrics store.
//!
//! Per-agent, per-metric ring buffers behind a single mutex. Recording
//! and querying never fail upward; a poisoned lock is the only way to
//! lose the store and the runtime treats that as unreachable.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::trace;

use crate::domain::models::{Metric, MetricSummary, MetricType};

type AgentMetrics = HashMap<String, VecDeque<Metric>>;

/// Fixed-capacity metric store keyed agent-id → metric-name.
pub struct MetricsStore {
    enabled: bool,
    capacity: usize,
    inner: Mutex<HashMap<String, AgentMetrics>>,
}

impl MetricsStore {
    /// Creates a store with the given ring capacity per metric.
    /// Capacity is clamped to at least 1.
    pub fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            capacity: capacity.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a sample to the agent's ring buffer for that metric name.
    pub fn record(
        &self,
        agent_id: &str,
        name: &str,
        value: Value,
        kind: MetricType,
        tags: HashMap<String, String>,
    ) {
        if !self.enabled {
            return;
        }
        let metric = Metric {
            name: name.to_string(),
            kind,
            value,
            timestamp: Utc::now(),
            tags,
        };

        let mut inner = self.inner.lock().expect("metrics lock");
        let buffer = inner
            .entry(agent_id.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(metric);
        trace!(agent_id = %agent_id, metric = %name, "metric recorded");
    }

    /// Shorthand for scalar gauges.
    pub fn record_gauge(&self, agent_id: &str, name: &str, value: f64) {
        self.record(agent_id, name, Value::from(value), MetricType::Gauge, HashMap::new());
    }

    /// Queries an agent's metrics, optionally filtered by name and a
    /// closed time range, and summarizes each per its type.
    pub fn query(
        &self,
        agent_id: &str,
        name: Option<&str>,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> HashMap<String, MetricSummary> {
        let inner = self.inner.lock().expect("metrics lock");
        let Some(agent_metrics) = inner.get(agent_id) else {
            return HashMap::new();
        };

        let mut out = HashMap::new();
        for (metric_name, buffer) in agent_metrics {
            if let Some(wanted) = name {
                if wanted != metric_name {
                    continue;
                }
            }
            let samples: Vec<&Metric> = buffer
                .iter()
                .filter(|m| match range {
                    Some((from, to)) => m.timestamp >= from && m.timestamp <= to,
                    None => true,
                })
                .collect();
            let Some(last) = samples.last() else {
                continue;
            };

            let summary = match last.kind {
                MetricType::Counter | MetricType::Gauge => {
                    let points: Vec<(DateTime<Utc>, f64)> = samples
                        .iter()
                        .filter_map(|m| m.as_f64().map(|v| (m.timestamp, v)))
                        .collect();
                    MetricSummary::Series {
                        latest: points.last().map_or(0.0, |(_, v)| *v),
                        points,
                    }
                }
                MetricType::Histogram => {
                    let mut values: Vec<f64> =
                        samples.iter().filter_map(|m| m.as_f64()).collect();
                    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let count = values.len();
                    if count == 0 {
                        continue;
                    }
                    let min = values[0];
                    let max = values[count - 1];
                    let mean = values.iter().sum::<f64>() / count as f64;
                    let median = if count % 2 == 1 {
                        values[count / 2]
                    } else {
                        (values[count / 2 - 1] + values[count / 2]) / 2.0
                    };
                    MetricSummary::Distribution {
                        count,
                        min,
                        max,
                        mean,
                        median,
                    }
                }
                MetricType::Summary => MetricSummary::Snapshot(last.value.clone()),
            };
            out.insert(metric_name.clone(), summary);
        }
        out
    }

    /// Agents that have recorded at least one metric.
    pub fn agent_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("metrics lock");
        let mut ids: Vec<String> = inner.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drops all samples for an agent (used when an agent is deleted).
    pub fn forget_agent(&self, agent_id: &str) {
        self.inner.lock().expect("metrics lock").remove(agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MetricsStore {
        MetricsStore::new(true, 100)
    }

    #[test]
    fn capacity_is_clamped_positive() {
        let store = MetricsStore::new(true, 0);
        assert_eq!(store.capacity(), 1);
    }

    #[test]
    fn gauge_query_returns_latest_and_series() {
        let store = store();
        store.record_gauge("a1", "queue_len", 1.0);
        store.record_gauge("a1", "queue_len", 3.0);

        let result = store.query("a1", Some("queue_len"), None);
        match &result["queue_len"] {
            MetricSummary::Series { latest, points } => {
                assert!((latest - 3.0).abs() < f64::EPSILON);
                assert_eq!(points.len(), 2);
            }
            other => panic!("unexpected summary: {other:?}"),
        }
    }

    #[test]
    fn histogram_statistics() {
        let store = store();
        for v in [4.0, 1.0, 3.0, 2.0] {
            store.record("a1", "latency", json!(v), MetricType::Histogram, HashMap::new());
        }

        let result = store.query("a1", None, None);
        match &result["latency"] {
            MetricSummary::Distribution {
                count,
                min,
                max,
                mean,
                median,
            } => {
                assert_eq!(*count, 4);
                assert!((min - 1.0).abs() < f64::EPSILON);
                assert!((max - 4.0).abs() < f64::EPSILON);
                assert!((mean - 2.5).abs() < f64::EPSILON);
                assert!((median - 2.5).abs() < f64::EPSILON);
            }
            other => panic!("unexpected summary: {other:?}"),
        }
    }

    #[test]
    fn summary_returns_latest_snapshot() {
        let store = store();
        store.record("a1", "percentiles", json!({ "p50": 10 }), MetricType::Summary, HashMap::new());
        store.record("a1", "percentiles", json!({ "p50": 12 }), MetricType::Summary, HashMap::new());

        let result = store.query("a1", None, None);
        assert_eq!(
            result["percentiles"],
            MetricSummary::Snapshot(json!({ "p50": 12 }))
        );
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let store = MetricsStore::new(true, 3);
        for i in 0..5 {
            store.record_gauge("a1", "g", f64::from(i));
        }

        let result = store.query("a1", None, None);
        match &result["g"] {
            MetricSummary::Series { points, .. } => {
                let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
                assert_eq!(values, vec![2.0, 3.0, 4.0]);
            }
            other => panic!("unexpected summary: {other:?}"),
        }
    }

    #[test]
    fn disabled_store_records_nothing() {
        let store = MetricsStore::new(false, 10);
        store.record_gauge("a1", "g", 1.0);
        assert!(store.query("a1", None, None).is_empty());
    }

    #[test]
    fn time_range_filter() {
        let store = store();
        store.record_gauge("a1", "g", 1.0);

        let past = Utc::now() - chrono::Duration::hours(2);
        let earlier = Utc::now() - chrono::Duration::hours(1);
        let result = store.query("a1", None, Some((past, earlier)));
        assert!(result.is_empty());
    }

    #[test]
    fn forget_agent_clears_samples() {
        let store = store();
        store.record_gauge("a1", "g", 1.0);
        store.forget_agent("a1");
        assert!(store.query("a1", None, None).is_empty());
    }
}
