//! Message tables for synthetic log lines.

use crate::model::{LogLevel, UiLanguage};

/// Used when a level has no table.
pub const UNKNOWN_EVENT: &str = "unknown system event";

const CRITICAL_EN: &[&str] = &[
    "SQL Injection attempt detected from IP 192.168.1.104",
    "Unauthorized access attempt on /admin/config",
    "Cross-Site Scripting (XSS) signature match",
    "Privilege escalation pattern in session #7731",
];

const ERROR_EN: &[&str] = &[
    "Connection pool exhausted (retry 2/3)",
    "Anomaly detection triggered: Unusual payload size",
    "Upstream AI provider returned HTTP 503",
    "Failed to persist batch #1182 to disk",
];

const WARNING_EN: &[&str] = &[
    "High latency detected in ingress (150ms)",
    "Buffer usage > 60%, scaling consumers",
    "Retry attempt 1/3 for downstream service",
    "Memory fragment warning in worker #2",
];

const INFO_EN: &[&str] = &[
    "Received batch of events from ingress-nginx",
    "Processing chunk ID #49281",
    "Flushing buffer to disk...",
    "AI analysis completed for request #8821",
];

const SAFE_EN: &[&str] = &[
    "Health check passed: component=db-connector",
    "Batch classified as safe, no action required",
    "Routine login from known address",
];

const CRITICAL_ZH: &[&str] = &[
    "检测到来自 IP 192.168.1.104 的 SQL 注入尝试",
    "对 /admin/config 的未授权访问尝试",
    "跨站脚本 (XSS) 签名匹配",
    "会话 #7731 中出现权限提升模式",
];

const ERROR_ZH: &[&str] = &[
    "连接池已耗尽 (重试 2/3)",
    "触发异常检测：异常的负载大小",
    "上游 AI 服务返回 HTTP 503",
    "批次 #1182 写入磁盘失败",
];

const WARNING_ZH: &[&str] = &[
    "检测到 Ingress 高延迟 (150ms)",
    "缓冲区使用率 > 60%，正在扩展消费者",
    "下游服务重试尝试 1/3",
    "工作线程 #2 中的内存碎片警告",
];

const INFO_ZH: &[&str] = &[
    "从 ingress-nginx 接收到一批事件",
    "正在处理分块 ID #49281",
    "正在将缓冲区刷新到磁盘...",
    "请求 #8821 的 AI 分析已完成",
];

const SAFE_ZH: &[&str] = &[
    "健康检查通过: component=db-connector",
    "批次判定为安全，无需处理",
    "来自已知地址的常规登录",
];

/// Message table for a level and language. `Unknown` has none.
pub fn messages(level: LogLevel, language: UiLanguage) -> Option<&'static [&'static str]> {
    let table = match (level, language) {
        (LogLevel::Critical, UiLanguage::En) => CRITICAL_EN,
        (LogLevel::Error, UiLanguage::En) => ERROR_EN,
        (LogLevel::Warning, UiLanguage::En) => WARNING_EN,
        (LogLevel::Info, UiLanguage::En) => INFO_EN,
        (LogLevel::Safe, UiLanguage::En) => SAFE_EN,
        (LogLevel::Critical, UiLanguage::Zh) => CRITICAL_ZH,
        (LogLevel::Error, UiLanguage::Zh) => ERROR_ZH,
        (LogLevel::Warning, UiLanguage::Zh) => WARNING_ZH,
        (LogLevel::Info, UiLanguage::Zh) => INFO_ZH,
        (LogLevel::Safe, UiLanguage::Zh) => SAFE_ZH,
        (LogLevel::Unknown, _) => return None,
    };
    Some(table)
}
