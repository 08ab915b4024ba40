//! Metric records and query summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Metric flavor, determining how queries summarize samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }
}

/// One recorded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricType,
    /// Scalar for counter/gauge/histogram; arbitrary snapshot for summary
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Metric {
    pub fn scalar(name: impl Into<String>, kind: MetricType, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Value::from(value),
            timestamp: Utc::now(),
            tags: HashMap::new(),
        }
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// Per-metric query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSummary {
    /// Latest value plus the (timestamp, value) series in range
    Series {
        latest: f64,
        points: Vec<(DateTime<Utc>, f64)>,
    },
    /// Distribution statistics across samples in range
    Distribution {
        count: usize,
        min: f64,
        max: f64,
        mean: f64,
        median: f64,
    },
    /// Latest snapshot, returned as-is
    Snapshot(Value),
}
