//! Telemetry store: the canonical in-memory view of live metrics.
//!
//! Each poll result is folded in here. The store decides whether a failed
//! fetch is masked with synthetic data (simulation mode) or surfaced as a
//! throttled failure notice (live mode).

mod throttle;

pub use throttle::*;

use crate::gateway::GatewayError;
use crate::model::{
    push_bounded, push_front_bounded, AlertEntry, Backpressure, CycleState, DashboardSnapshot,
    LogEntry, LogPage, MetricPoint, RiskDistribution, UiLanguage, ALERT_CAPACITY, LOG_CAPACITY,
    MEMORY_HISTORY, METRIC_WINDOW,
};
use crate::synthetic::SyntheticGenerator;
use crate::timefmt;

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// The most recent user-visible backend failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNotice {
    pub message: String,
    pub time: String,
}

/// Serializable copy of everything the dashboard renders.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryState {
    pub cycle: CycleState,
    pub simulation: bool,
    pub total_logs: u64,
    pub net_latency: f64,
    pub ai_latency: f64,
    pub ai_trigger_count: u64,
    pub memory_percent: u32,
    pub memory_history: VecDeque<u32>,
    pub queue_percent: u32,
    pub backpressure: Backpressure,
    pub metrics: VecDeque<MetricPoint>,
    pub risk: RiskDistribution,
    pub alerts: VecDeque<AlertEntry>,
    pub logs: VecDeque<LogEntry>,
    pub latest_batch_summary: Option<String>,
    pub last_notice: Option<FailureNotice>,
    /// Notices let through the throttle since start.
    pub notices_emitted: u64,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            cycle: CycleState::Idle,
            simulation: true,
            total_logs: 1_245_890,
            net_latency: 0.05,
            ai_latency: 800.0,
            ai_trigger_count: 8_420,
            memory_percent: 68,
            memory_history: VecDeque::with_capacity(MEMORY_HISTORY),
            queue_percent: 12,
            backpressure: Backpressure::Normal,
            metrics: VecDeque::with_capacity(METRIC_WINDOW),
            risk: RiskDistribution {
                critical: 2,
                error: 15,
                warning: 45,
                info: 120,
                safe: 8_500,
            },
            alerts: VecDeque::with_capacity(ALERT_CAPACITY),
            logs: VecDeque::with_capacity(LOG_CAPACITY),
            latest_batch_summary: None,
            last_notice: None,
            notices_emitted: 0,
        }
    }
}

/// Result of folding one telemetry fetch into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Updated,
    /// Fetch failed and synthetic data was used instead.
    Degraded,
    /// Fetch failed in live mode. `notify` is set when the throttle lets a
    /// user-visible notice through.
    Errored { notify: bool },
}

/// Result of folding one log fetch into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    Merged { appended: usize },
    Simulated { appended: usize },
    Failed,
}

pub struct TelemetryStore {
    state: TelemetryState,
    generator: SyntheticGenerator,
    throttle: FailureThrottle,
    language: UiLanguage,
    last_total: Option<u64>,
}

impl TelemetryStore {
    pub fn new(simulation: bool, notice_window: Duration) -> Self {
        Self {
            state: TelemetryState {
                simulation,
                ..TelemetryState::default()
            },
            generator: SyntheticGenerator::default(),
            throttle: FailureThrottle::new(notice_window),
            language: UiLanguage::En,
            last_total: None,
        }
    }

    /// Replace the synthetic source, e.g. with a seeded one.
    #[cfg(test)]
    pub fn with_generator(mut self, generator: SyntheticGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn state(&self) -> &TelemetryState {
        &self.state
    }

    /// Copy of the state with alert ages computed against the current time.
    pub fn snapshot(&self) -> TelemetryState {
        let mut state = self.state.clone();
        let now = Utc::now();
        for alert in state.alerts.iter_mut() {
            alert.age = timefmt::relative_label(&alert.time, now, self.language);
        }
        state
    }

    pub fn is_simulation(&self) -> bool {
        self.state.simulation
    }

    pub fn set_simulation(&mut self, enabled: bool) {
        self.state.simulation = enabled;
    }

    /// Language used for synthetic log messages.
    pub fn set_language(&mut self, language: UiLanguage) {
        self.language = language;
    }

    pub fn begin_cycle(&mut self) {
        self.state.cycle = CycleState::Fetching;
    }

    /// Seed an empty chart with 60 zeroed points ending now.
    pub fn prefill_chart(&mut self) {
        if !self.state.metrics.is_empty() {
            return;
        }
        for i in 0..METRIC_WINDOW {
            let secs_ago = (METRIC_WINDOW - i) as i64;
            self.state.metrics.push_back(MetricPoint {
                time: timefmt::clock_label_ago(secs_ago),
                qps: 0,
                ai_rate: 0,
            });
        }
    }

    /// Fold a telemetry fetch result into the store.
    pub fn apply_telemetry(
        &mut self,
        result: Result<DashboardSnapshot, GatewayError>,
        now: Instant,
    ) -> CycleOutcome {
        match result {
            Ok(snapshot) => {
                self.apply_dashboard(snapshot);
                CycleOutcome::Updated
            }
            Err(e) if self.state.simulation => {
                tracing::debug!("Dashboard fetch failed, using synthetic data: {}", e);
                self.simulate_tick();
                self.state.cycle = CycleState::Degraded;
                CycleOutcome::Degraded
            }
            Err(e) => {
                tracing::warn!("Dashboard fetch failed: {}", e);
                self.state.cycle = CycleState::Errored;
                let notify = self.throttle.should_emit(now);
                if notify {
                    self.state.notices_emitted += 1;
                    self.state.last_notice = Some(FailureNotice {
                        message: e.to_string(),
                        time: timefmt::clock_label(),
                    });
                }
                CycleOutcome::Errored { notify }
            }
        }
    }

    /// Overwrite live counters from a backend snapshot and append one chart point.
    ///
    /// Counters are last write wins, so a late response may move them back.
    /// The chart's qps only counts growth past the highest total seen; a total
    /// at or below it plots as zero.
    pub fn apply_dashboard(&mut self, snapshot: DashboardSnapshot) {
        let qps = match self.last_total {
            Some(prev) => snapshot.total_logs.saturating_sub(prev),
            None => 0,
        };
        self.last_total = Some(self.last_total.map_or(snapshot.total_logs, |prev| prev.max(snapshot.total_logs)));

        let state = &mut self.state;
        state.total_logs = snapshot.total_logs;
        state.net_latency = snapshot.avg_response_time;
        state.risk = snapshot.risk;
        state.alerts = snapshot.alerts.into_iter().take(ALERT_CAPACITY).collect();
        if let Some(summary) = snapshot.latest_batch_summary {
            state.latest_batch_summary = Some(summary);
        }

        push_bounded(
            &mut state.metrics,
            MetricPoint {
                time: timefmt::clock_label(),
                qps,
                ai_rate: qps / 10,
            },
            METRIC_WINDOW,
        );
        state.cycle = CycleState::Updated;
    }

    /// Advance every synthetic series by one tick.
    pub fn simulate_tick(&mut self) {
        let generator = &mut self.generator;
        let state = &mut self.state;

        state.total_logs = state.total_logs.saturating_add(generator.processed_increment());
        state.ai_trigger_count = state.ai_trigger_count.saturating_add(generator.ai_trigger_increment());

        state.queue_percent = generator.next_queue_percent(state.queue_percent);
        state.backpressure = Backpressure::from_queue_percent(state.queue_percent);

        state.memory_percent = generator.next_memory_percent();
        push_bounded(&mut state.memory_history, state.memory_percent, MEMORY_HISTORY);

        state.net_latency = generator.next_net_latency(state.net_latency);
        state.ai_latency = generator.next_ai_latency(state.ai_latency);

        let previous = state.risk;
        state.risk = generator.jitter(previous);
        if state.risk.error > previous.error {
            push_front_bounded(&mut state.alerts, generator.error_alert(), ALERT_CAPACITY);
        }

        push_bounded(&mut state.metrics, generator.sample(), METRIC_WINDOW);
    }

    /// Fold a log fetch result into the store.
    pub fn apply_logs(&mut self, result: Result<LogPage, GatewayError>) -> LogOutcome {
        match result {
            Ok(page) => LogOutcome::Merged {
                appended: self.merge_logs(page),
            },
            Err(e) if self.state.simulation => {
                tracing::debug!("Log fetch failed, using synthetic logs: {}", e);
                for _ in 0..2 {
                    let entry = self.generator.random_log(self.language);
                    push_bounded(&mut self.state.logs, entry, LOG_CAPACITY);
                }
                LogOutcome::Simulated { appended: 2 }
            }
            Err(e) => {
                tracing::warn!("Log fetch failed: {}", e);
                LogOutcome::Failed
            }
        }
    }

    /// Append entries not yet buffered, oldest first. Pages arrive newest first.
    pub fn merge_logs(&mut self, page: LogPage) -> usize {
        let mut appended = 0;
        for entry in page.logs.into_iter().rev() {
            if self.state.logs.iter().any(|e| e.id == entry.id) {
                continue;
            }
            push_bounded(&mut self.state.logs, entry, LOG_CAPACITY);
            appended += 1;
        }
        appended
    }
}
