//! Configuration model types.
//!
//! A `ConfigSnapshot` is created from hard-coded defaults at engine start,
//! replaced wholesale on load, then edited incrementally.

use serde::{Deserialize, Serialize};

/// Identifier of a prompt or channel row.
///
/// `New` marks an entry the backend has not assigned an id to yet. On the
/// wire it is `0`, which the backend treats as "create".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RecordId {
    #[default]
    New,
    Assigned(i64),
}

impl From<i64> for RecordId {
    fn from(raw: i64) -> Self {
        if raw <= 0 {
            Self::New
        } else {
            Self::Assigned(raw)
        }
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::New => 0,
            RecordId::Assigned(raw) => raw,
        }
    }
}

/// Top-level configuration subtrees tracked for dirtiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// AI settings without the prompt list.
    Ai,
    Kernel,
    General,
    Prompts,
    Channels,
}

impl Section {
    /// Persistence order used by save.
    pub const ALL: [Section; 5] = [
        Section::Ai,
        Section::Kernel,
        Section::General,
        Section::Prompts,
        Section::Channels,
    ];
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Ai => "ai",
            Section::Kernel => "kernel",
            Section::General => "general",
            Section::Prompts => "prompts",
            Section::Channels => "channels",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiLanguage {
    #[default]
    En,
    Zh,
}

impl UiLanguage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub language: UiLanguage,
    pub retention_days: u32,
    pub disk_quota_gb: u32,
    pub listen_port: u16,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            language: UiLanguage::En,
            retention_days: 7,
            disk_quota_gb: 1,
            listen_port: 8080,
        }
    }
}

/// Fallback behaviour when the primary model keeps failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationPolicy {
    pub auto_degrade: bool,
    pub fallback_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_seconds: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptPhase {
    /// Runs over individual log batches.
    #[default]
    Map,
    /// Aggregates map outputs.
    Reduce,
}

impl PromptPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub content: String,
    pub active: bool,
    #[serde(default)]
    pub phase: PromptPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSettings {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub source_language: String,
    pub max_batch_size: u32,
    pub degradation: DegradationPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub active_map_template: RecordId,
    pub active_reduce_template: RecordId,
    /// Tracked as its own section, see [`Section::Prompts`].
    pub prompts: Vec<PromptTemplate>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4-turbo".to_string(),
            api_key: String::new(),
            source_language: "English".to_string(),
            max_batch_size: 50,
            degradation: DegradationPolicy {
                auto_degrade: false,
                fallback_model: "local-mock".to_string(),
            },
            circuit_breaker: CircuitBreakerPolicy {
                enabled: true,
                failure_threshold: 5,
                cooldown_seconds: 60,
            },
            active_map_template: RecordId::New,
            active_reduce_template: RecordId::New,
            prompts: default_prompts(),
        }
    }
}

fn default_prompts() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            id: RecordId::New,
            name: "Security Audit".to_string(),
            content: "Analyze the following log entries for potential security breaches.\n\
                      Focus on: SQL Injection patterns, XSS attempts, and unauthorized access.\n\
                      Output format: JSON with \"risk_score\" and \"analysis\".\n\n\
                      Logs:\n{{logs_batch}}"
                .to_string(),
            active: true,
            phase: PromptPhase::Map,
        },
        PromptTemplate {
            id: RecordId::New,
            name: "Root Cause Analysis".to_string(),
            content: "Identify the root cause of the system failure based on the provided stack traces and error logs.\n\
                      Correlate timestamps between services.\n\n\
                      Context:\n{{logs_batch}}"
                .to_string(),
            active: false,
            phase: PromptPhase::Map,
        },
        PromptTemplate {
            id: RecordId::New,
            name: "Batch Digest".to_string(),
            content: "Summarize the following per-batch findings into a single incident report.\n\n\
                      Findings:\n{{map_results}}"
                .to_string(),
            active: true,
            phase: PromptPhase::Reduce,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vendor {
    DingTalk,
    Lark,
    Slack,
    Custom,
}

impl Vendor {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dingtalk" => Self::DingTalk,
            "lark" | "feishu" => Self::Lark,
            "slack" => Self::Slack,
            _ => Self::Custom,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DingTalk => "DingTalk",
            Self::Lark => "Lark",
            Self::Slack => "Slack",
            Self::Custom => "Custom",
        }
    }
}

/// Minimum severity that triggers a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threshold {
    Critical,
    Error,
    Warning,
}

impl Threshold {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" => Self::Critical,
            "error" | "medium" => Self::Error,
            _ => Self::Warning,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Error => "Error",
            Self::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub vendor: Vendor,
    pub webhook_url: String,
    pub threshold: Threshold,
    /// JSON payload with `{{summary}}` style placeholders.
    #[serde(default)]
    pub payload_template: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub channels: Vec<NotificationChannel>,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            channels: vec![
                NotificationChannel {
                    id: RecordId::New,
                    name: "Ops Team (DingTalk)".to_string(),
                    vendor: Vendor::DingTalk,
                    webhook_url: "https://oapi.dingtalk.com/robot/send?access_token=...".to_string(),
                    threshold: Threshold::Error,
                    payload_template: r#"{"msgtype": "text", "text": {"content": "Alert: {{summary}}"}}"#.to_string(),
                    enabled: true,
                },
                NotificationChannel {
                    id: RecordId::New,
                    name: "Security (Slack)".to_string(),
                    vendor: Vendor::Slack,
                    webhook_url: "https://hooks.slack.com/services/...".to_string(),
                    threshold: Threshold::Critical,
                    payload_template: r#"{"text": "Alert: {{summary}}"}"#.to_string(),
                    enabled: false,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSettings {
    pub worker_threads: u32,
    pub io_buffer_size: String,
    pub adaptive_batching: bool,
    pub flush_interval_ms: u32,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            io_buffer_size: "256MB".to_string(),
            adaptive_batching: true,
            flush_interval_ms: 200,
        }
    }
}

/// The whole operational configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub general: GeneralSettings,
    pub ai: AiSettings,
    pub integration: IntegrationSettings,
    pub kernel: KernelSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_wire_form() {
        assert_eq!(serde_json::to_value(RecordId::New).unwrap(), 0);
        assert_eq!(serde_json::to_value(RecordId::Assigned(42)).unwrap(), 42);
        assert_eq!(serde_json::from_str::<RecordId>("0").unwrap(), RecordId::New);
        assert_eq!(serde_json::from_str::<RecordId>("-3").unwrap(), RecordId::New);
        assert_eq!(serde_json::from_str::<RecordId>("7").unwrap(), RecordId::Assigned(7));
    }

    #[test]
    fn test_vendor_and_threshold_parse() {
        assert_eq!(Vendor::parse("dingtalk"), Vendor::DingTalk);
        assert_eq!(Vendor::parse("SLACK"), Vendor::Slack);
        assert_eq!(Vendor::parse("teams"), Vendor::Custom);
        assert_eq!(Threshold::parse("critical"), Threshold::Critical);
        assert_eq!(Threshold::parse("Error"), Threshold::Error);
        assert_eq!(Threshold::parse("whatever"), Threshold::Warning);
    }

    #[test]
    fn test_defaults() {
        let snapshot = ConfigSnapshot::default();
        assert_eq!(snapshot.kernel.worker_threads, 4);
        assert_eq!(snapshot.kernel.io_buffer_size, "256MB");
        assert_eq!(snapshot.general.listen_port, 8080);
        assert_eq!(snapshot.integration.channels.len(), 2);
        assert!(snapshot.ai.prompts.iter().all(|p| p.id == RecordId::New));
    }
}
