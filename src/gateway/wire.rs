//! Backend wire types and their normalization into the model.

use super::codec::{decode_config, encode_section, lenient_flag, ConfigItem};
use crate::model::{
    AlertEntry, ConfigSnapshot, DashboardSnapshot, LogEntry, LogLevel, LogPage, NotificationChannel,
    PromptPhase, PromptTemplate, RecordId, RiskDistribution, Section, Threshold, Vendor,
    ALERT_CAPACITY,
};
use crate::timefmt::to_display_time;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Prompt ids at or above this offset belong to the reduce phase.
pub const REDUCE_ID_OFFSET: i64 = 100_000_000;

/// Service name attached to alerts reported by the backend.
const BACKEND_SERVICE: &str = "LogSentinel";

#[derive(Debug, Clone, Deserialize)]
pub struct AlertInfo {
    pub trace_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub time: String,
}

/// `GET /api/dashboard` body.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub total_logs: i64,
    #[serde(default, alias = "high_risk")]
    pub critical_risk: i64,
    #[serde(default, alias = "medium_risk")]
    pub error_risk: i64,
    #[serde(default, alias = "low_risk")]
    pub warning_risk: i64,
    #[serde(default)]
    pub info_risk: i64,
    #[serde(default)]
    pub safe_risk: Option<i64>,
    #[serde(default)]
    pub unknown_risk: i64,
    #[serde(default)]
    pub avg_response_time: f64,
    #[serde(default)]
    pub recent_alerts: Vec<AlertInfo>,
    #[serde(default)]
    pub latest_batch_summary: Option<String>,
}

fn count(raw: i64) -> u64 {
    raw.max(0) as u64
}

impl DashboardResponse {
    pub fn normalize(self) -> DashboardSnapshot {
        let total = count(self.total_logs);
        let critical = count(self.critical_risk);
        let error = count(self.error_risk);
        let warning = count(self.warning_risk);
        let info = count(self.info_risk);
        let unknown = count(self.unknown_risk);
        let safe = match self.safe_risk {
            Some(safe) => count(safe),
            None => RiskDistribution::derive_safe(total, critical, error, warning, info, unknown),
        };

        let alerts = self
            .recent_alerts
            .into_iter()
            .take(ALERT_CAPACITY)
            .map(|a| AlertEntry {
                id: a.trace_id,
                time: to_display_time(&a.time),
                age: None,
                service: BACKEND_SERVICE.to_string(),
                level: LogLevel::Error,
                summary: a.summary,
            })
            .collect();

        DashboardSnapshot {
            total_logs: total,
            risk: RiskDistribution { critical, error, warning, info, safe },
            unknown_risk: unknown,
            avg_response_time: self.avg_response_time,
            alerts,
            latest_batch_summary: self.latest_batch_summary.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalLogItem {
    pub trace_id: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub processed_at: String,
}

/// `GET /api/history` body.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub logs: Vec<HistoricalLogItem>,
    #[serde(default)]
    pub total_count: i64,
}

impl HistoryResponse {
    pub fn normalize(self) -> LogPage {
        LogPage {
            logs: self
                .logs
                .into_iter()
                .map(|item| LogEntry {
                    id: item.trace_id,
                    timestamp: to_display_time(&item.processed_at),
                    level: LogLevel::normalize(&item.risk_level),
                    message: item.summary,
                })
                .collect(),
            total_count: count(self.total_count),
        }
    }
}

/// A prompt row, inbound and outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub id: i64,
    pub name: String,
    pub content: String,
    #[serde(deserialize_with = "lenient_flag", default)]
    pub is_active: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
}

impl PromptRecord {
    fn into_template(self) -> PromptTemplate {
        let phase = match self.prompt_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("reduce") => PromptPhase::Reduce,
            Some("map") => PromptPhase::Map,
            _ if self.id >= REDUCE_ID_OFFSET => PromptPhase::Reduce,
            _ => PromptPhase::Map,
        };
        PromptTemplate {
            id: RecordId::from(self.id),
            name: self.name,
            content: self.content,
            active: self.is_active,
            phase,
        }
    }

    pub fn from_template(template: &PromptTemplate) -> Self {
        Self {
            id: template.id.into(),
            name: template.name.clone(),
            content: template.content.clone(),
            is_active: template.active,
            prompt_type: Some(template.phase.as_str().to_string()),
        }
    }
}

/// A notification channel row, inbound and outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub webhook_url: String,
    pub alert_threshold: String,
    #[serde(default)]
    pub msg_template: String,
    #[serde(deserialize_with = "lenient_flag", default)]
    pub is_active: bool,
}

impl ChannelRecord {
    fn into_channel(self) -> NotificationChannel {
        NotificationChannel {
            id: RecordId::from(self.id),
            name: self.name,
            vendor: Vendor::parse(&self.provider),
            webhook_url: self.webhook_url,
            threshold: Threshold::parse(&self.alert_threshold),
            payload_template: self.msg_template,
            enabled: self.is_active,
        }
    }

    pub fn from_channel(channel: &NotificationChannel) -> Self {
        Self {
            id: channel.id.into(),
            name: channel.name.clone(),
            provider: channel.vendor.as_str().to_string(),
            webhook_url: channel.webhook_url.clone(),
            alert_threshold: channel.threshold.as_str().to_string(),
            msg_template: channel.payload_template.clone(),
            is_active: channel.enabled,
        }
    }
}

/// `GET /api/settings/all` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsResponse {
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub prompts: Vec<PromptRecord>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
}

impl SettingsResponse {
    /// Build a full snapshot. Keys the backend omits fall back to defaults.
    pub fn normalize(self) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        decode_config(&self.config, &mut snapshot);
        snapshot.ai.prompts = self.prompts.into_iter().map(PromptRecord::into_template).collect();
        snapshot.integration.channels = self.channels.into_iter().map(ChannelRecord::into_channel).collect();
        snapshot
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdate {
    pub items: Vec<ConfigItem>,
}

/// A complete replacement of one section, ready to post.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistPayload {
    Config(Vec<ConfigItem>),
    Prompts(Vec<PromptRecord>),
    Channels(Vec<ChannelRecord>),
}

impl PersistPayload {
    pub fn for_section(snapshot: &ConfigSnapshot, section: Section) -> Self {
        match section {
            Section::Ai | Section::Kernel | Section::General => {
                PersistPayload::Config(encode_section(snapshot, section))
            }
            Section::Prompts => {
                PersistPayload::Prompts(snapshot.ai.prompts.iter().map(PromptRecord::from_template).collect())
            }
            Section::Channels => PersistPayload::Channels(
                snapshot
                    .integration
                    .channels
                    .iter()
                    .map(ChannelRecord::from_channel)
                    .collect(),
            ),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            PersistPayload::Config(_) => "/api/settings/config",
            PersistPayload::Prompts(_) => "/api/settings/prompts",
            PersistPayload::Channels(_) => "/api/settings/channels",
        }
    }
}
