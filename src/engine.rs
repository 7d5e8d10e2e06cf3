//! Engine: shared state container wiring the gateway, stores and scheduler.
//!
//! Telemetry mutations take a short synchronous lock that is never held
//! across an await. Settings commands are serialized through an async lock
//! because load and save span network calls.

use crate::config::EngineConfig;
use crate::gateway::{Backend, GatewayError};
use crate::model::{ConfigSnapshot, CycleState, Section};
use crate::scheduler::PollScheduler;
use crate::settings::{DirtySections, SaveOutcome, SettingsEdit, SettingsSync, SyncError};
use crate::telemetry::{CycleOutcome, LogOutcome, TelemetryState, TelemetryStore};

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::broadcast;

/// Notifications for state consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    TelemetryUpdated(CycleState),
    LogsUpdated,
    /// Throttled notice that the backend could not be reached in live mode.
    BackendUnreachable { message: String },
    SettingsLoaded,
    SettingsChanged(Section),
    SettingsSaved(SaveOutcome),
    RestartRequested,
}

impl EngineEvent {
    /// Event name used on the consumer event stream.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TelemetryUpdated(_) => "telemetry_updated",
            EngineEvent::LogsUpdated => "logs_updated",
            EngineEvent::BackendUnreachable { .. } => "backend_unreachable",
            EngineEvent::SettingsLoaded => "settings_loaded",
            EngineEvent::SettingsChanged(_) => "settings_changed",
            EngineEvent::SettingsSaved(_) => "settings_saved",
            EngineEvent::RestartRequested => "restart_requested",
        }
    }
}

struct Inner {
    config: EngineConfig,
    backend: Arc<dyn Backend>,
    telemetry: Mutex<TelemetryStore>,
    settings: tokio::sync::Mutex<SettingsSync>,
    events: broadcast::Sender<EngineEvent>,
    scheduler: PollScheduler,
}

/// Cheap-to-clone handle over the engine state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Arc<dyn Backend>) -> Self {
        let store = TelemetryStore::new(config.simulation, config.failure_notice_window);
        Self::with_store(config, backend, store)
    }

    /// Build around a prepared telemetry store.
    pub fn with_store(config: EngineConfig, backend: Arc<dyn Backend>, store: TelemetryStore) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                settings: tokio::sync::Mutex::new(SettingsSync::new(backend.clone())),
                telemetry: Mutex::new(store),
                scheduler: PollScheduler::default(),
                config,
                backend,
                events,
            }),
        }
    }

    fn store(&self) -> MutexGuard<'_, TelemetryStore> {
        self.inner
            .telemetry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: EngineEvent) {
        // No receivers is not an error.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the current telemetry state.
    pub fn telemetry(&self) -> TelemetryState {
        self.store().snapshot()
    }

    /// Copy of the live configuration.
    pub async fn settings(&self) -> ConfigSnapshot {
        self.inner.settings.lock().await.live().clone()
    }

    pub async fn dirty(&self) -> DirtySections {
        self.inner.settings.lock().await.is_dirty()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.scheduler.telemetry.is_running()
    }

    pub fn is_log_streaming(&self) -> bool {
        self.inner.scheduler.logs.is_running()
    }

    /// Start or stop the telemetry loop. Returns the new running state.
    pub fn set_polling(&self, running: bool) -> bool {
        if running {
            self.store().prefill_chart();
            let engine = self.clone();
            self.inner.scheduler.telemetry.start(self.inner.config.telemetry_interval, move || {
                let engine = engine.clone();
                async move {
                    engine.telemetry_cycle().await;
                }
            });
        } else {
            self.inner.scheduler.telemetry.stop();
        }
        self.is_polling()
    }

    /// Start or stop the log loop. Independent of telemetry polling.
    pub fn set_log_stream(&self, running: bool) -> bool {
        if running {
            let engine = self.clone();
            self.inner.scheduler.logs.start(self.inner.config.log_interval, move || {
                let engine = engine.clone();
                async move {
                    engine.log_cycle().await;
                }
            });
        } else {
            self.inner.scheduler.logs.stop();
        }
        self.is_log_streaming()
    }

    pub fn set_simulation_mode(&self, enabled: bool) -> bool {
        let mut store = self.store();
        if store.is_simulation() != enabled {
            store.set_simulation(enabled);
            tracing::info!("Simulation mode {}", if enabled { "enabled" } else { "disabled" });
        }
        enabled
    }

    /// Run one telemetry fetch and fold its result in.
    pub async fn telemetry_cycle(&self) -> CycleOutcome {
        self.store().begin_cycle();

        let result = self.inner.backend.fetch_telemetry().await;
        let message = result.as_ref().err().map(GatewayError::to_string);

        let (outcome, cycle) = {
            let mut store = self.store();
            let outcome = store.apply_telemetry(result, Instant::now());
            (outcome, store.state().cycle)
        };

        if let (CycleOutcome::Errored { notify: true }, Some(message)) = (outcome, message) {
            self.emit(EngineEvent::BackendUnreachable { message });
        }
        self.emit(EngineEvent::TelemetryUpdated(cycle));
        outcome
    }

    /// Run one log fetch and fold its result in.
    pub async fn log_cycle(&self) -> LogOutcome {
        let result = self.inner.backend.fetch_logs(1, self.inner.config.log_page_size).await;
        let outcome = self.store().apply_logs(result);

        match outcome {
            LogOutcome::Merged { appended: 0 } | LogOutcome::Failed => {}
            _ => self.emit(EngineEvent::LogsUpdated),
        }
        outcome
    }

    /// Replace the live configuration with the backend's.
    pub async fn load_settings(&self) -> Result<ConfigSnapshot, SyncError> {
        let snapshot = {
            let mut settings = self.inner.settings.lock().await;
            settings.load().await?.clone()
        };
        self.store().set_language(snapshot.general.language);
        self.emit(EngineEvent::SettingsLoaded);
        Ok(snapshot)
    }

    pub async fn mutate_settings(&self, edit: SettingsEdit) -> Result<Section, SyncError> {
        let (section, language) = {
            let mut settings = self.inner.settings.lock().await;
            let section = settings.mutate(edit)?;
            (section, settings.live().general.language)
        };
        if section == Section::General {
            self.store().set_language(language);
        }
        self.emit(EngineEvent::SettingsChanged(section));
        Ok(section)
    }

    pub async fn save_settings(&self) -> Result<SaveOutcome, SyncError> {
        let outcome = self.inner.settings.lock().await.save().await?;
        self.emit(EngineEvent::SettingsSaved(outcome.clone()));
        Ok(outcome)
    }

    /// Ask the backend to restart its process.
    pub async fn restart(&self) -> Result<(), GatewayError> {
        self.inner.backend.restart().await?;
        tracing::info!("Backend restart requested");
        self.emit(EngineEvent::RestartRequested);
        Ok(())
    }

    /// Stop both poll loops.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PersistPayload;
    use crate::model::{DashboardSnapshot, LogEntry, LogLevel, LogPage, RiskDistribution, UiLanguage};
    use crate::settings::tests::RecordingBackend;
    use crate::synthetic::SyntheticGenerator;

    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Backend answering telemetry and logs with fixed data.
    struct OnlineBackend;

    #[async_trait]
    impl Backend for OnlineBackend {
        async fn fetch_telemetry(&self) -> Result<DashboardSnapshot, GatewayError> {
            Ok(DashboardSnapshot {
                total_logs: 1000,
                risk: RiskDistribution { critical: 1, error: 2, warning: 3, info: 4, safe: 990 },
                unknown_risk: 0,
                avg_response_time: 12.5,
                alerts: Vec::new(),
                latest_batch_summary: None,
            })
        }

        async fn fetch_logs(&self, _page: u32, page_size: u32) -> Result<LogPage, GatewayError> {
            Ok(LogPage {
                logs: vec![
                    LogEntry {
                        id: "b".into(),
                        timestamp: "2025-01-01 08:00:01".into(),
                        level: LogLevel::Info,
                        message: format!("page of {}", page_size),
                    },
                    LogEntry {
                        id: "a".into(),
                        timestamp: "2025-01-01 08:00:00".into(),
                        level: LogLevel::Warning,
                        message: "older".into(),
                    },
                ],
                total_count: 2,
            })
        }

        async fn fetch_settings(&self) -> Result<ConfigSnapshot, GatewayError> {
            Ok(ConfigSnapshot::default())
        }

        async fn persist(&self, _payload: PersistPayload) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn restart(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    /// Backend whose dashboard answers only after a delay.
    struct SlowBackend {
        delay: Duration,
        total_logs: u64,
    }

    #[async_trait]
    impl Backend for SlowBackend {
        async fn fetch_telemetry(&self) -> Result<DashboardSnapshot, GatewayError> {
            tokio::time::sleep(self.delay).await;
            let mut snapshot = OnlineBackend.fetch_telemetry().await?;
            snapshot.total_logs = self.total_logs;
            Ok(snapshot)
        }

        async fn fetch_logs(&self, page: u32, page_size: u32) -> Result<LogPage, GatewayError> {
            OnlineBackend.fetch_logs(page, page_size).await
        }

        async fn fetch_settings(&self) -> Result<ConfigSnapshot, GatewayError> {
            OnlineBackend.fetch_settings().await
        }

        async fn persist(&self, payload: PersistPayload) -> Result<(), GatewayError> {
            OnlineBackend.persist(payload).await
        }

        async fn restart(&self) -> Result<(), GatewayError> {
            OnlineBackend.restart().await
        }
    }

    fn engine(simulation: bool, backend: Arc<dyn Backend>) -> Engine {
        let config = EngineConfig {
            simulation,
            ..EngineConfig::default()
        };
        let store = TelemetryStore::new(simulation, config.failure_notice_window)
            .with_generator(SyntheticGenerator::seeded(7));
        Engine::with_store(config, backend, store)
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_live_cycle_applies_dashboard() {
        let engine = engine(false, Arc::new(OnlineBackend));
        let mut rx = engine.subscribe();

        assert_eq!(engine.telemetry_cycle().await, CycleOutcome::Updated);
        let state = engine.telemetry();
        assert_eq!(state.risk, RiskDistribution { critical: 1, error: 2, warning: 3, info: 4, safe: 990 });
        assert_eq!(state.net_latency, 12.5);
        assert_eq!(state.cycle, CycleState::Updated);
        assert_eq!(drain(&mut rx), vec![EngineEvent::TelemetryUpdated(CycleState::Updated)]);
    }

    #[tokio::test]
    async fn test_simulation_failure_is_silent() {
        let engine = engine(true, Arc::new(RecordingBackend::default()));
        let mut rx = engine.subscribe();
        let before = engine.telemetry().metrics.len();

        assert_eq!(engine.telemetry_cycle().await, CycleOutcome::Degraded);
        assert_eq!(engine.telemetry().metrics.len(), before + 1);

        let events = drain(&mut rx);
        assert!(events.iter().all(|e| !matches!(e, EngineEvent::BackendUnreachable { .. })));
        assert_eq!(events, vec![EngineEvent::TelemetryUpdated(CycleState::Degraded)]);
    }

    #[tokio::test]
    async fn test_live_failures_notify_once_per_window() {
        let engine = engine(false, Arc::new(RecordingBackend::default()));
        let mut rx = engine.subscribe();

        engine.telemetry_cycle().await;
        engine.telemetry_cycle().await;

        let notices = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::BackendUnreachable { .. }))
            .count();
        assert_eq!(notices, 1);
        assert_eq!(engine.telemetry().cycle, CycleState::Errored);
    }

    #[tokio::test]
    async fn test_log_cycle_merges_and_dedupes() {
        let engine = engine(false, Arc::new(OnlineBackend));
        assert_eq!(engine.log_cycle().await, LogOutcome::Merged { appended: 2 });
        assert_eq!(engine.log_cycle().await, LogOutcome::Merged { appended: 0 });

        let logs = engine.telemetry().logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, "a");
        assert_eq!(logs[1].message, "page of 50");
    }

    #[tokio::test]
    async fn test_log_failure_in_live_mode_keeps_buffer() {
        let engine = engine(false, Arc::new(RecordingBackend::default()));
        assert_eq!(engine.log_cycle().await, LogOutcome::Failed);
        assert!(engine.telemetry().logs.is_empty());

        engine.set_simulation_mode(true);
        assert_eq!(engine.log_cycle().await, LogOutcome::Simulated { appended: 2 });
    }

    #[tokio::test]
    async fn test_polling_controls_are_independent() {
        let engine = engine(true, Arc::new(RecordingBackend::default()));

        assert!(engine.set_polling(true));
        assert_eq!(engine.telemetry().metrics.len(), 60);
        assert!(engine.set_log_stream(true));

        assert!(!engine.set_log_stream(false));
        assert!(engine.is_polling());

        assert!(!engine.set_polling(false));
        assert!(!engine.is_log_streaming());
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_polling_loop_drives_cycles() {
        let engine = engine(true, Arc::new(RecordingBackend::default()));
        let mut rx = engine.subscribe();

        engine.set_polling(true);
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(event, Ok(Ok(EngineEvent::TelemetryUpdated(_)))));
        engine.set_polling(false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_stop_still_applies() {
        let backend = Arc::new(SlowBackend {
            delay: Duration::from_secs(3),
            total_logs: 4242,
        });
        let engine = engine(false, backend);
        let mut rx = engine.subscribe();

        engine.set_polling(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.set_polling(false);
        assert_eq!(engine.telemetry().cycle, CycleState::Fetching);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = engine.telemetry();
        assert_eq!(state.total_logs, 4242);
        assert_eq!(state.cycle, CycleState::Updated);
        assert_eq!(state.risk, RiskDistribution { critical: 1, error: 2, warning: 3, info: 4, safe: 990 });
        assert_eq!(drain(&mut rx), vec![EngineEvent::TelemetryUpdated(CycleState::Updated)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_responses_apply_in_arrival_order() {
        let engine = engine(false, Arc::new(SlowBackend {
            delay: Duration::from_millis(2500),
            total_logs: 10,
        }));

        // Ticks at 0s, 1s and 2s all overlap; every response still lands.
        engine.set_polling(true);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        engine.set_polling(false);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let state = engine.telemetry();
        assert_eq!(state.metrics.len(), 60);
        assert_eq!(state.cycle, CycleState::Updated);
        assert_eq!(state.total_logs, 10);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EngineEvent::BackendUnreachable { message: String::new() }.name(), "backend_unreachable");
        assert_eq!(EngineEvent::TelemetryUpdated(CycleState::Idle).name(), "telemetry_updated");
    }

    #[tokio::test]
    async fn test_settings_commands_emit_events() {
        let backend = Arc::new(RecordingBackend::with_snapshot(&ConfigSnapshot::default()));
        let engine = engine(true, backend.clone());
        let mut rx = engine.subscribe();

        engine.load_settings().await.unwrap();
        let section = engine
            .mutate_settings(SettingsEdit::Field { key: "app_language".into(), value: json!("zh") })
            .await
            .unwrap();
        assert_eq!(section, Section::General);
        assert!(engine.dirty().await.general);

        let outcome = engine.save_settings().await.unwrap();
        assert_eq!(outcome.sent, vec![Section::General]);
        assert_eq!(engine.settings().await.general.language, UiLanguage::Zh);
        assert!(!engine.dirty().await.any());

        engine.restart().await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::SettingsLoaded,
                EngineEvent::SettingsChanged(Section::General),
                EngineEvent::SettingsSaved(outcome),
                EngineEvent::RestartRequested,
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_edit_is_rejected() {
        let engine = engine(true, Arc::new(RecordingBackend::default()));
        let err = engine
            .mutate_settings(SettingsEdit::Field { key: "nope".into(), value: json!(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Field(_)));
    }
}
