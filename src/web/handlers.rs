//! HTTP request handlers.

use super::AppState;
use crate::settings::{DirtySections, SettingsEdit, SyncError};
use crate::model::ConfigSnapshot;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

fn sync_error_response(e: SyncError) -> Response {
    let status = match e {
        SyncError::Field(_) => StatusCode::BAD_REQUEST,
        SyncError::Load(_) | SyncError::Persist { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string()).into_response()
}

// ============================================================================
// State views
// ============================================================================

pub async fn handle_telemetry(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.telemetry())
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub settings: ConfigSnapshot,
    pub dirty: DirtySections,
}

pub async fn handle_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(SettingsView {
        settings: state.engine.settings().await,
        dirty: state.engine.dirty().await,
    })
}

// ============================================================================
// Event stream
// ============================================================================

/// Engine events as server-sent events, including throttled failure notices.
pub async fn handle_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.engine.subscribe()).filter_map(|received| match received {
        Ok(event) => match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::error!("Failed to encode {} event: {}", event.name(), e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("Event stream lagged, skipped {} events", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Commands: polling
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RunningRequest {
    pub running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub enabled: bool,
}

pub async fn handle_polling(
    State(state): State<AppState>,
    Json(req): Json<RunningRequest>,
) -> impl IntoResponse {
    Json(RunningRequest {
        running: state.engine.set_polling(req.running),
    })
}

pub async fn handle_log_stream(
    State(state): State<AppState>,
    Json(req): Json<RunningRequest>,
) -> impl IntoResponse {
    Json(RunningRequest {
        running: state.engine.set_log_stream(req.running),
    })
}

pub async fn handle_simulation(
    State(state): State<AppState>,
    Json(req): Json<SimulationRequest>,
) -> impl IntoResponse {
    Json(SimulationRequest {
        enabled: state.engine.set_simulation_mode(req.enabled),
    })
}

// ============================================================================
// Commands: settings
// ============================================================================

pub async fn handle_load_settings(State(state): State<AppState>) -> Response {
    match state.engine.load_settings().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => sync_error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub section: crate::model::Section,
}

pub async fn handle_edit_settings(
    State(state): State<AppState>,
    Json(edit): Json<SettingsEdit>,
) -> Response {
    match state.engine.mutate_settings(edit).await {
        Ok(section) => Json(EditResponse { section }).into_response(),
        Err(e) => sync_error_response(e),
    }
}

pub async fn handle_save_settings(State(state): State<AppState>) -> Response {
    match state.engine.save_settings().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => sync_error_response(e),
    }
}

pub async fn handle_restart(State(state): State<AppState>) -> Response {
    match state.engine.restart().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::model::ConfigSnapshot;
    use crate::settings::tests::RecordingBackend;
    use crate::web::Server;

    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn live_config() -> EngineConfig {
        EngineConfig {
            simulation: false,
            ..EngineConfig::default()
        }
    }

    async fn spawn_console(backend: Arc<RecordingBackend>) -> (String, Engine) {
        spawn_console_with(EngineConfig::default(), backend).await
    }

    async fn spawn_console_with(config: EngineConfig, backend: Arc<RecordingBackend>) -> (String, Engine) {
        let engine = Engine::new(config, backend);
        let router = Server::new(engine.clone(), 0).routes();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}", addr), engine)
    }

    #[tokio::test]
    async fn test_settings_round_trip_over_http() {
        let backend = Arc::new(RecordingBackend::with_snapshot(&ConfigSnapshot::default()));
        let (base, _engine) = spawn_console(backend.clone()).await;
        let client = reqwest::Client::new();

        let loaded = client.post(format!("{}/commands/settings/load", base)).send().await.unwrap();
        assert_eq!(loaded.status(), 200);

        let edited: Value = client
            .post(format!("{}/commands/settings/edit", base))
            .json(&json!({"op": "field", "key": "kernel_worker_threads", "value": 8}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(edited, json!({"section": "kernel"}));

        let view: Value = client.get(format!("{}/state/settings", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(view["dirty"]["kernel"], true);
        assert_eq!(view["settings"]["kernel"]["worker_threads"], 8);

        let saved: Value = client
            .post(format!("{}/commands/settings/save", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(saved["sent"], json!(["kernel"]));
        assert_eq!(saved["restart_advised"], true);
        assert_eq!(backend.persisted_paths(), vec!["/api/settings/config"]);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let backend = Arc::new(RecordingBackend::default());
        *backend.fail_reload.lock().unwrap() = true;
        let (base, _engine) = spawn_console(backend).await;
        let client = reqwest::Client::new();

        let bad_edit = client
            .post(format!("{}/commands/settings/edit", base))
            .json(&json!({"op": "field", "key": "http_port", "value": "not a port"}))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_edit.status(), 400);

        let load = client.post(format!("{}/commands/settings/load", base)).send().await.unwrap();
        assert_eq!(load.status(), 502);

        let restart = client.post(format!("{}/commands/restart", base)).send().await.unwrap();
        assert_eq!(restart.status(), 202);
    }

    #[tokio::test]
    async fn test_polling_commands() {
        let (base, engine) = spawn_console(Arc::new(RecordingBackend::default())).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{}/commands/log-stream", base))
            .json(&json!({"running": true}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"running": true}));
        assert!(engine.is_log_streaming());
        assert!(!engine.is_polling());

        let body: Value = client
            .post(format!("{}/commands/simulation", base))
            .json(&json!({"enabled": false}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"enabled": false}));

        let telemetry: Value = client.get(format!("{}/state/telemetry", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(telemetry["simulation"], false);

        engine.shutdown();
    }

    #[tokio::test]
    async fn test_live_failures_surface_one_notice() {
        let (base, engine) = spawn_console_with(live_config(), Arc::new(RecordingBackend::default())).await;
        engine.telemetry_cycle().await;
        engine.telemetry_cycle().await;

        let telemetry: Value = reqwest::get(format!("{}/state/telemetry", base)).await.unwrap().json().await.unwrap();
        assert_eq!(telemetry["cycle"], "Errored");
        assert_eq!(telemetry["notices_emitted"], 1);
        assert!(telemetry["last_notice"]["message"].as_str().unwrap().contains("unused"));
    }

    #[tokio::test]
    async fn test_event_stream_delivers_notice() {
        let (base, engine) = spawn_console_with(live_config(), Arc::new(RecordingBackend::default())).await;
        let mut response = reqwest::get(format!("{}/events", base)).await.unwrap();
        assert_eq!(response.status(), 200);

        engine.telemetry_cycle().await;
        engine.telemetry_cycle().await;

        let mut received = String::new();
        while received.matches("event: telemetry_updated").count() < 2 {
            let chunk = tokio::time::timeout(Duration::from_secs(2), response.chunk())
                .await
                .expect("event stream stalled")
                .unwrap()
                .expect("event stream closed");
            received.push_str(&String::from_utf8_lossy(&chunk));
        }

        assert_eq!(received.matches("event: backend_unreachable").count(), 1);
        assert!(received.contains("\"type\":\"BackendUnreachable\""));
    }
}
