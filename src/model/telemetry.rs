//! Telemetry model types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding window of chart points.
pub const METRIC_WINDOW: usize = 60;
/// Maximum number of buffered log entries.
pub const LOG_CAPACITY: usize = 200;
/// Maximum number of recent alerts.
pub const ALERT_CAPACITY: usize = 7;
/// Number of memory samples kept for the sparkline.
pub const MEMORY_HISTORY: usize = 20;

/// A single throughput sample on the live chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub time: String,
    pub qps: u64,
    #[serde(rename = "aiRate")]
    pub ai_rate: u64,
}

/// Canonical risk level. Backend vocabularies are folded into these six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Safe,
    Unknown,
}

impl LogLevel {
    /// Normalize a backend risk-level string, case-insensitively.
    ///
    /// Legacy names (`High`, `Medium`, `Low`) are accepted. Anything
    /// unrecognized becomes `Unknown`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" => Self::Critical,
            "error" | "medium" => Self::Error,
            "warning" | "warn" | "low" => Self::Warning,
            "info" => Self::Info,
            "safe" => Self::Safe,
            _ => Self::Unknown,
        }
    }
}

/// A processed log line as shown in the live log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

/// A recent alert, newest first in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub id: String,
    pub time: String,
    /// Relative label ("5 minutes ago"), refreshed on every state read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    pub service: String,
    pub level: LogLevel,
    pub summary: String,
}

/// Count of analysed logs per risk level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiskDistribution {
    pub critical: u64,
    pub error: u64,
    pub warning: u64,
    pub info: u64,
    pub safe: u64,
}

impl RiskDistribution {
    /// Safe count derived as the remainder of `total` once every other
    /// bucket (including unknown) is subtracted. Never negative.
    pub fn derive_safe(total: u64, critical: u64, error: u64, warning: u64, info: u64, unknown: u64) -> u64 {
        let classified = critical
            .saturating_add(error)
            .saturating_add(warning)
            .saturating_add(info)
            .saturating_add(unknown);
        total.saturating_sub(classified)
    }
}

/// UI-facing label derived from queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backpressure {
    Normal,
    Active,
    Full,
}

impl Backpressure {
    pub fn from_queue_percent(percent: u32) -> Self {
        if percent > 80 {
            Self::Full
        } else if percent > 50 {
            Self::Active
        } else {
            Self::Normal
        }
    }
}

/// Outcome of the most recent telemetry poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    Idle,
    Fetching,
    Updated,
    Degraded,
    Errored,
}

/// Normalized `/api/dashboard` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub total_logs: u64,
    pub risk: RiskDistribution,
    pub unknown_risk: u64,
    pub avg_response_time: f64,
    pub alerts: Vec<AlertEntry>,
    pub latest_batch_summary: Option<String>,
}

/// Normalized `/api/history` page.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub total_count: u64,
}

/// Push to the back of a bounded buffer, evicting from the front.
pub fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    while buf.len() > cap {
        buf.pop_front();
    }
}

/// Push to the front of a bounded buffer, evicting from the back.
pub fn push_front_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_front(item);
    buf.truncate(cap);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_risk_level() {
        assert_eq!(LogLevel::normalize("CRITICAL"), LogLevel::Critical);
        assert_eq!(LogLevel::normalize("High"), LogLevel::Critical);
        assert_eq!(LogLevel::normalize(" error "), LogLevel::Error);
        assert_eq!(LogLevel::normalize("Medium"), LogLevel::Error);
        assert_eq!(LogLevel::normalize("warn"), LogLevel::Warning);
        assert_eq!(LogLevel::normalize("info"), LogLevel::Info);
        assert_eq!(LogLevel::normalize("Safe"), LogLevel::Safe);
        assert_eq!(LogLevel::normalize("catastrophic"), LogLevel::Unknown);
        assert_eq!(LogLevel::normalize(""), LogLevel::Unknown);
    }

    #[test]
    fn test_derive_safe_saturates() {
        assert_eq!(RiskDistribution::derive_safe(1000, 1, 2, 3, 4, 0), 990);
        assert_eq!(RiskDistribution::derive_safe(5, 10, 0, 0, 0, 0), 0);
    }

    #[test]
    fn test_backpressure_thresholds() {
        assert_eq!(Backpressure::from_queue_percent(5), Backpressure::Normal);
        assert_eq!(Backpressure::from_queue_percent(50), Backpressure::Normal);
        assert_eq!(Backpressure::from_queue_percent(51), Backpressure::Active);
        assert_eq!(Backpressure::from_queue_percent(80), Backpressure::Active);
        assert_eq!(Backpressure::from_queue_percent(81), Backpressure::Full);
    }

    #[test]
    fn test_bounded_buffers() {
        let mut buf = VecDeque::new();
        for i in 0..5 {
            push_bounded(&mut buf, i, 3);
        }
        assert_eq!(buf, VecDeque::from(vec![2, 3, 4]));

        let mut front = VecDeque::new();
        for i in 0..5 {
            push_front_bounded(&mut front, i, 3);
        }
        assert_eq!(front, VecDeque::from(vec![4, 3, 2]));
    }

    #[test]
    fn test_risk_distribution_serializes_pascal_case() {
        let risk = RiskDistribution { critical: 1, error: 2, warning: 3, info: 4, safe: 5 };
        let json = serde_json::to_value(risk).unwrap();
        assert_eq!(json["Critical"], 1);
        assert_eq!(json["Safe"], 5);
    }
}
