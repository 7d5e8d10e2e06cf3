//! Configuration module for the console engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine and server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the backend dashboard API (default: "http://127.0.0.1:8080")
    pub backend_url: String,
    /// HTTP port for the consumer API (default: 3000)
    pub http_port: u16,
    /// Start in simulation mode (default: true)
    pub simulation: bool,
    /// Telemetry poll period (default: 1s)
    pub telemetry_interval: Duration,
    /// Log poll period (default: 1s)
    pub log_interval: Duration,
    /// Page size for log fetches (default: 50)
    pub log_page_size: u32,
    /// Per-request timeout for backend calls (default: 5s)
    pub request_timeout: Duration,
    /// Minimum spacing between backend-unreachable notices (default: 3s)
    pub failure_notice_window: Duration,
    /// Start telemetry polling at boot (default: false)
    pub autostart: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".to_string(),
            http_port: 3000,
            simulation: true,
            telemetry_interval: Duration::from_millis(1000),
            log_interval: Duration::from_millis(1000),
            log_page_size: 50,
            request_timeout: Duration::from_millis(5000),
            failure_notice_window: Duration::from_millis(3000),
            autostart: false,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {}", name, raw);
            None
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    parse_env::<u64>(name).filter(|ms| *ms > 0).map(Duration::from_millis)
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    let parsed = parse_flag(&raw);
    if parsed.is_none() {
        tracing::warn!("Ignoring invalid value for {}: {}", name, raw);
    }
    parsed
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SENTINEL_BACKEND_URL`: backend base URL
    /// - `SENTINEL_HTTP_PORT`: consumer API port
    /// - `SENTINEL_SIMULATION`: start in simulation mode (1/0, true/false, yes/no)
    /// - `SENTINEL_TELEMETRY_INTERVAL_MS`, `SENTINEL_LOG_INTERVAL_MS`: poll periods
    /// - `SENTINEL_LOG_PAGE_SIZE`: log fetch page size
    /// - `SENTINEL_REQUEST_TIMEOUT_MS`: backend request timeout
    /// - `SENTINEL_FAILURE_NOTICE_MS`: failure notice throttle window
    /// - `SENTINEL_AUTOSTART`: start telemetry polling at boot
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(url) = env::var("SENTINEL_BACKEND_URL") {
            if !url.trim().is_empty() {
                cfg.backend_url = url.trim().to_string();
            }
        }

        if let Some(port) = parse_env("SENTINEL_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(simulation) = env_flag("SENTINEL_SIMULATION") {
            cfg.simulation = simulation;
        }

        if let Some(period) = env_millis("SENTINEL_TELEMETRY_INTERVAL_MS") {
            cfg.telemetry_interval = period;
        }

        if let Some(period) = env_millis("SENTINEL_LOG_INTERVAL_MS") {
            cfg.log_interval = period;
        }

        if let Some(size) = parse_env::<u32>("SENTINEL_LOG_PAGE_SIZE").filter(|s| *s > 0) {
            cfg.log_page_size = size;
        }

        if let Some(timeout) = env_millis("SENTINEL_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout = timeout;
        }

        if let Some(window) = env_millis("SENTINEL_FAILURE_NOTICE_MS") {
            cfg.failure_notice_window = window;
        }

        if let Some(autostart) = env_flag("SENTINEL_AUTOSTART") {
            cfg.autostart = autostart;
        }

        cfg
    }
}
