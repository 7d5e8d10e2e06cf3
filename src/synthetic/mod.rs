//! Synthetic telemetry used when the backend is unreachable in simulation mode.
//!
//! Every draw comes from the generator's own RNG; nothing here can fail.

mod messages;

pub use messages::*;

use crate::model::{AlertEntry, LogEntry, LogLevel, MetricPoint, RiskDistribution, UiLanguage};
use crate::timefmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ALERT_SERVICES: [&str; 3] = ["DB-Connector", "Ingress", "AI-Worker"];

/// Pseudo-random source of plausible telemetry.
pub struct SyntheticGenerator {
    rng: StdRng,
    seq: u64,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seq: 0,
        }
    }
}

impl SyntheticGenerator {
    /// Deterministic generator for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seq: 0,
        }
    }

    /// A chart point: qps in [500, 1500), aiRate at 10-30% of qps.
    pub fn sample(&mut self) -> MetricPoint {
        let qps = self.rng.gen_range(500..1500u64);
        let ratio = self.rng.gen_range(0.1..0.3);
        MetricPoint {
            time: timefmt::clock_label(),
            qps,
            ai_rate: (qps as f64 * ratio) as u64,
        }
    }

    /// A log line with a level drawn from the fixed thresholds.
    pub fn random_log(&mut self, language: UiLanguage) -> LogEntry {
        let level = level_for(self.rng.gen::<f64>());
        let message = messages(level, language)
            .and_then(|table| table.choose(&mut self.rng))
            .copied()
            .unwrap_or(UNKNOWN_EVENT);

        LogEntry {
            id: self.next_id("log"),
            timestamp: timefmt::precise_clock_label(),
            level,
            message: message.to_string(),
        }
    }

    /// Bump risk counters with decreasing probability per severity.
    pub fn jitter(&mut self, risk: RiskDistribution) -> RiskDistribution {
        let mut next = risk;
        if self.rng.gen_bool(0.2) {
            next.safe = next.safe.saturating_add(self.rng.gen_range(0..10));
        }
        if self.rng.gen_bool(0.02) {
            next.info = next.info.saturating_add(1);
        }
        if self.rng.gen_bool(0.01) {
            next.warning = next.warning.saturating_add(1);
        }
        if self.rng.gen_bool(0.005) {
            next.error = next.error.saturating_add(1);
        }
        if self.rng.gen_bool(0.002) {
            next.critical = next.critical.saturating_add(1);
        }
        next
    }

    /// Alert that accompanies a synthetic error increment.
    pub fn error_alert(&mut self) -> AlertEntry {
        let service = ALERT_SERVICES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(ALERT_SERVICES[0]);
        AlertEntry {
            id: self.next_id("alert"),
            time: timefmt::clock_label(),
            age: None,
            service: service.to_string(),
            level: LogLevel::Error,
            summary: "Simulated system error event detected".to_string(),
        }
    }

    /// Random walk: rare spike up to +15, otherwise drain up to -5. Clamped to [5, 100].
    pub fn next_queue_percent(&mut self, current: u32) -> u32 {
        let next = if self.rng.gen_bool(0.05) {
            current.saturating_add(self.rng.gen_range(0..15))
        } else {
            current.saturating_sub(self.rng.gen_range(0..5))
        };
        next.clamp(5, 100)
    }

    pub fn next_memory_percent(&mut self) -> u32 {
        self.rng.gen_range(40..=70)
    }

    /// Network latency drifts by at most 0.025 and never drops below 0.01.
    pub fn next_net_latency(&mut self, current: f64) -> f64 {
        let drift = (self.rng.gen::<f64>() - 0.5) * 0.05;
        let next = ((current + drift) * 1000.0).round() / 1000.0;
        next.max(0.01)
    }

    /// AI latency drifts by at most 50 and never drops below 100.
    pub fn next_ai_latency(&mut self, current: f64) -> f64 {
        let drift = (self.rng.gen::<f64>() - 0.5) * 100.0;
        (current + drift).floor().max(100.0)
    }

    /// Logs processed since the previous tick.
    pub fn processed_increment(&mut self) -> u64 {
        self.rng.gen_range(10..60)
    }

    /// AI invocations since the previous tick.
    pub fn ai_trigger_increment(&mut self) -> u64 {
        if self.rng.gen_bool(0.5) {
            self.rng.gen_range(0..5)
        } else {
            0
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("sim-{}-{}-{:04x}", prefix, self.seq, self.rng.gen::<u16>())
    }
}

/// Map a uniform [0, 1) draw to a level, rarest first.
pub fn level_for(draw: f64) -> LogLevel {
    if draw > 0.96 {
        LogLevel::Critical
    } else if draw > 0.90 {
        LogLevel::Error
    } else if draw > 0.85 {
        LogLevel::Warning
    } else if draw > 0.70 {
        LogLevel::Safe
    } else {
        LogLevel::Info
    }
}
