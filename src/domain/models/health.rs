//! Health check types emitted by the monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Assessment level for a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }

    /// Numeric value published as a gauge metric.
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::Healthy => 0.0,
            Self::Warning => 1.0,
            Self::Critical => 2.0,
            Self::Unknown => 3.0,
        }
    }
}

/// One periodic assessment of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub agent_id: String,
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl HealthCheck {
    pub fn new(agent_id: impl Into<String>, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_values_are_ordered_by_severity() {
        assert!(HealthStatus::Healthy.as_gauge() < HealthStatus::Warning.as_gauge());
        assert!(HealthStatus::Warning.as_gauge() < HealthStatus::Critical.as_gauge());
    }

    #[test]
    fn details_builder() {
        let check = HealthCheck::new("a1", HealthStatus::Warning, "stalled")
            .with_detail("stall_secs", serde_json::json!(320));
        assert_eq!(check.details["stall_secs"], serde_json::json!(320));
    }
}
