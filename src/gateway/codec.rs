//! Typed decoding of the backend's flat configuration map.
//!
//! The backend stores every setting as a string keyed row. Each key is
//! declared here with its section and type; values are decoded through the
//! declared type and nothing undeclared reaches the model.

use crate::model::{ConfigSnapshot, RecordId, Section, UiLanguage};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Declared type of a config leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Flag,
    /// Text restricted to a fixed vocabulary.
    Choice(&'static [&'static str]),
}

/// A decoded config value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl ConfigValue {
    /// Wire form written back to `/api/settings/config`.
    pub fn to_wire(&self) -> String {
        match self {
            ConfigValue::Flag(true) => "1".to_string(),
            ConfigValue::Flag(false) => "0".to_string(),
            ConfigValue::Integer(n) => n.to_string(),
            ConfigValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("setting {key} expects {expected}")]
    KindMismatch { key: String, expected: &'static str },
    #[error("setting {key} out of range: {value}")]
    OutOfRange { key: String, value: i64 },
    #[error("no entry at index {index}")]
    NoSuchEntry { index: usize },
}

/// A declared config key.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub section: Section,
    pub kind: FieldKind,
}

const LANGUAGES: &[&str] = &["en", "zh"];

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec { key: "app_language", section: Section::General, kind: FieldKind::Choice(LANGUAGES) },
    FieldSpec { key: "log_retention_days", section: Section::General, kind: FieldKind::Integer },
    FieldSpec { key: "max_disk_usage_gb", section: Section::General, kind: FieldKind::Integer },
    FieldSpec { key: "http_port", section: Section::General, kind: FieldKind::Integer },
    FieldSpec { key: "ai_provider", section: Section::Ai, kind: FieldKind::Text },
    FieldSpec { key: "ai_model", section: Section::Ai, kind: FieldKind::Text },
    FieldSpec { key: "ai_api_key", section: Section::Ai, kind: FieldKind::Text },
    FieldSpec { key: "ai_language", section: Section::Ai, kind: FieldKind::Text },
    FieldSpec { key: "kernel_max_batch", section: Section::Ai, kind: FieldKind::Integer },
    FieldSpec { key: "ai_auto_degrade", section: Section::Ai, kind: FieldKind::Flag },
    FieldSpec { key: "ai_fallback_model", section: Section::Ai, kind: FieldKind::Text },
    FieldSpec { key: "ai_circuit_breaker", section: Section::Ai, kind: FieldKind::Flag },
    FieldSpec { key: "ai_failure_threshold", section: Section::Ai, kind: FieldKind::Integer },
    FieldSpec { key: "ai_cooldown_seconds", section: Section::Ai, kind: FieldKind::Integer },
    FieldSpec { key: "active_map_prompt_id", section: Section::Ai, kind: FieldKind::Integer },
    FieldSpec { key: "active_reduce_prompt_id", section: Section::Ai, kind: FieldKind::Integer },
    FieldSpec { key: "kernel_worker_threads", section: Section::Kernel, kind: FieldKind::Integer },
    FieldSpec { key: "kernel_io_buffer", section: Section::Kernel, kind: FieldKind::Text },
    FieldSpec { key: "kernel_adaptive_mode", section: Section::Kernel, kind: FieldKind::Flag },
    FieldSpec { key: "kernel_refresh_interval", section: Section::Kernel, kind: FieldKind::Integer },
];

pub fn field_spec(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Lenient boolean: `true`/`false`, `1`/`0`, `"1"`/`"true"` (any case).
/// Other strings read as false; null and structures do not decode.
pub fn decode_flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n == 1),
        Value::String(s) => {
            let s = s.trim();
            Some(s == "1" || s.eq_ignore_ascii_case("true"))
        }
        _ => None,
    }
}

/// serde adapter for lenient boolean fields such as `is_active`.
pub fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(decode_flag(&raw).unwrap_or(false))
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::Integer => "an integer",
            FieldKind::Flag => "a boolean",
            FieldKind::Choice(_) => "one of the allowed values",
        }
    }

    /// Decode a raw wire or edit value through this declared type.
    pub fn decode(self, raw: &Value) -> Option<ConfigValue> {
        match self {
            FieldKind::Flag => decode_flag(raw).map(ConfigValue::Flag),
            FieldKind::Integer => match raw {
                Value::Number(n) => n.as_i64().map(ConfigValue::Integer),
                Value::String(s) => s.trim().parse().ok().map(ConfigValue::Integer),
                _ => None,
            },
            FieldKind::Text => match raw {
                Value::String(s) => Some(ConfigValue::Text(s.clone())),
                Value::Number(n) => Some(ConfigValue::Text(n.to_string())),
                Value::Bool(b) => Some(ConfigValue::Text(b.to_string())),
                _ => None,
            },
            FieldKind::Choice(allowed) => match raw {
                Value::String(s) => {
                    let lowered = s.trim().to_ascii_lowercase();
                    allowed
                        .iter()
                        .find(|a| **a == lowered)
                        .map(|a| ConfigValue::Text((*a).to_string()))
                }
                _ => None,
            },
        }
    }
}

fn as_u32(key: &str, value: i64) -> Result<u32, FieldError> {
    u32::try_from(value).map_err(|_| FieldError::OutOfRange {
        key: key.to_string(),
        value,
    })
}

/// Current value of a declared key.
pub fn read_field(snapshot: &ConfigSnapshot, key: &str) -> Result<ConfigValue, FieldError> {
    use ConfigValue::{Flag, Integer, Text};

    let general = &snapshot.general;
    let ai = &snapshot.ai;
    let kernel = &snapshot.kernel;

    let value = match key {
        "app_language" => Text(general.language.as_str().to_string()),
        "log_retention_days" => Integer(general.retention_days.into()),
        "max_disk_usage_gb" => Integer(general.disk_quota_gb.into()),
        "http_port" => Integer(general.listen_port.into()),
        "ai_provider" => Text(ai.provider.clone()),
        "ai_model" => Text(ai.model.clone()),
        "ai_api_key" => Text(ai.api_key.clone()),
        "ai_language" => Text(ai.source_language.clone()),
        "kernel_max_batch" => Integer(ai.max_batch_size.into()),
        "ai_auto_degrade" => Flag(ai.degradation.auto_degrade),
        "ai_fallback_model" => Text(ai.degradation.fallback_model.clone()),
        "ai_circuit_breaker" => Flag(ai.circuit_breaker.enabled),
        "ai_failure_threshold" => Integer(ai.circuit_breaker.failure_threshold.into()),
        "ai_cooldown_seconds" => Integer(ai.circuit_breaker.cooldown_seconds.into()),
        "active_map_prompt_id" => Integer(ai.active_map_template.into()),
        "active_reduce_prompt_id" => Integer(ai.active_reduce_template.into()),
        "kernel_worker_threads" => Integer(kernel.worker_threads.into()),
        "kernel_io_buffer" => Text(kernel.io_buffer_size.clone()),
        "kernel_adaptive_mode" => Flag(kernel.adaptive_batching),
        "kernel_refresh_interval" => Integer(kernel.flush_interval_ms.into()),
        other => return Err(FieldError::UnknownKey(other.to_string())),
    };
    Ok(value)
}

/// Decode `raw` through the key's declared type and store it.
///
/// Returns the section the key belongs to.
pub fn write_field(snapshot: &mut ConfigSnapshot, key: &str, raw: &Value) -> Result<Section, FieldError> {
    let spec = field_spec(key).ok_or_else(|| FieldError::UnknownKey(key.to_string()))?;
    let mismatch = || FieldError::KindMismatch {
        key: key.to_string(),
        expected: spec.kind.describe(),
    };
    let value = spec.kind.decode(raw).ok_or_else(mismatch)?;

    let general = &mut snapshot.general;
    let ai = &mut snapshot.ai;
    let kernel = &mut snapshot.kernel;

    match (key, value) {
        ("app_language", ConfigValue::Text(s)) => {
            general.language = UiLanguage::parse(&s).ok_or_else(mismatch)?;
        }
        ("log_retention_days", ConfigValue::Integer(n)) => general.retention_days = as_u32(key, n)?,
        ("max_disk_usage_gb", ConfigValue::Integer(n)) => general.disk_quota_gb = as_u32(key, n)?,
        ("http_port", ConfigValue::Integer(n)) => {
            general.listen_port = u16::try_from(n).map_err(|_| FieldError::OutOfRange {
                key: key.to_string(),
                value: n,
            })?;
        }
        ("ai_provider", ConfigValue::Text(s)) => ai.provider = s,
        ("ai_model", ConfigValue::Text(s)) => ai.model = s,
        ("ai_api_key", ConfigValue::Text(s)) => ai.api_key = s,
        ("ai_language", ConfigValue::Text(s)) => ai.source_language = s,
        ("kernel_max_batch", ConfigValue::Integer(n)) => ai.max_batch_size = as_u32(key, n)?,
        ("ai_auto_degrade", ConfigValue::Flag(b)) => ai.degradation.auto_degrade = b,
        ("ai_fallback_model", ConfigValue::Text(s)) => ai.degradation.fallback_model = s,
        ("ai_circuit_breaker", ConfigValue::Flag(b)) => ai.circuit_breaker.enabled = b,
        ("ai_failure_threshold", ConfigValue::Integer(n)) => {
            ai.circuit_breaker.failure_threshold = as_u32(key, n)?
        }
        ("ai_cooldown_seconds", ConfigValue::Integer(n)) => {
            ai.circuit_breaker.cooldown_seconds = as_u32(key, n)?
        }
        ("active_map_prompt_id", ConfigValue::Integer(n)) => ai.active_map_template = RecordId::from(n),
        ("active_reduce_prompt_id", ConfigValue::Integer(n)) => ai.active_reduce_template = RecordId::from(n),
        ("kernel_worker_threads", ConfigValue::Integer(n)) => kernel.worker_threads = as_u32(key, n)?,
        ("kernel_io_buffer", ConfigValue::Text(s)) => kernel.io_buffer_size = s,
        ("kernel_adaptive_mode", ConfigValue::Flag(b)) => kernel.adaptive_batching = b,
        ("kernel_refresh_interval", ConfigValue::Integer(n)) => kernel.flush_interval_ms = as_u32(key, n)?,
        _ => return Err(mismatch()),
    }

    Ok(spec.section)
}

/// Overlay a fetched config map onto `snapshot`.
///
/// Absent keys keep the snapshot's value; undecodable values are logged and
/// skipped the same way.
pub fn decode_config(raw: &HashMap<String, Value>, snapshot: &mut ConfigSnapshot) {
    for spec in FIELDS {
        let Some(value) = raw.get(spec.key) else {
            continue;
        };
        if let Err(e) = write_field(snapshot, spec.key, value) {
            tracing::debug!("Keeping default for {}: {}", spec.key, e);
        }
    }

    for key in raw.keys().filter(|k| field_spec(k).is_none()) {
        tracing::debug!("Ignoring undeclared config key {}", key);
    }
}

/// One `{key, value}` row of a config update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}

/// Every declared key of a keyed section, as a full replacement payload.
pub fn encode_section(snapshot: &ConfigSnapshot, section: Section) -> Vec<ConfigItem> {
    FIELDS
        .iter()
        .filter(|f| f.section == section)
        .filter_map(|f| {
            read_field(snapshot, f.key).ok().map(|v| ConfigItem {
                key: f.key.to_string(),
                value: v.to_wire(),
            })
        })
        .collect()
}
