//! HTTP implementation of the backend gateway.

use super::{Backend, DashboardResponse, GatewayError, HistoryResponse, PersistPayload, SettingsResponse};
use super::wire::ConfigUpdate;
use crate::model::{ConfigSnapshot, DashboardSnapshot, LogPage};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Gateway talking JSON over HTTP to the backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Network(e.to_string())
        }
    }

    fn check_status(path: &str, response: &reqwest::Response) -> Result<(), GatewayError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        Self::check_status(path, &response)?;

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(format!("{}: {}", path, e)))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<(), GatewayError> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.send_error(e))?;
        Self::check_status(path, &response)
    }
}

#[async_trait]
impl Backend for HttpGateway {
    async fn fetch_telemetry(&self) -> Result<DashboardSnapshot, GatewayError> {
        let raw: DashboardResponse = self.get_json("/api/dashboard", &[]).await?;
        Ok(raw.normalize())
    }

    async fn fetch_logs(&self, page: u32, page_size: u32) -> Result<LogPage, GatewayError> {
        let query = [("page", page.to_string()), ("pageSize", page_size.to_string())];
        let raw: HistoryResponse = self.get_json("/api/history", &query).await?;
        Ok(raw.normalize())
    }

    async fn fetch_settings(&self) -> Result<ConfigSnapshot, GatewayError> {
        let raw: SettingsResponse = self.get_json("/api/settings/all", &[]).await?;
        Ok(raw.normalize())
    }

    async fn persist(&self, payload: PersistPayload) -> Result<(), GatewayError> {
        let path = payload.path();
        match payload {
            PersistPayload::Config(items) => self.post(path, Some(&ConfigUpdate { items })).await,
            PersistPayload::Prompts(records) => self.post(path, Some(&records)).await,
            PersistPayload::Channels(records) => self.post(path, Some(&records)).await,
        }
    }

    async fn restart(&self) -> Result<(), GatewayError> {
        self.post::<()>("/api/restart", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLevel, Section};

    use axum::{
        extract::{Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fake_backend(captured: Captured) -> Router {
        Router::new()
            .route(
                "/api/dashboard",
                get(|| async {
                    Json(json!({
                        "total_logs": 1000, "critical_risk": 1, "error_risk": 2,
                        "warning_risk": 3, "info_risk": 4, "safe_risk": 990,
                        "unknown_risk": 0, "avg_response_time": 12.5, "recent_alerts": []
                    }))
                }),
            )
            .route(
                "/api/history",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "logs": [{
                            "trace_id": format!("p{}-s{}", q["page"], q["pageSize"]),
                            "risk_level": "warning",
                            "summary": "slow",
                            "processed_at": "2025-01-01 00:00:00"
                        }],
                        "total_count": 1
                    }))
                }),
            )
            .route(
                "/api/settings/all",
                get(|| async {
                    Json(json!({
                        "config": {"kernel_worker_threads": "6"},
                        "prompts": [],
                        "channels": []
                    }))
                }),
            )
            .route(
                "/api/settings/config",
                post(|State(c): State<Captured>, Json(body): Json<Value>| async move {
                    c.lock().unwrap().push(("config".to_string(), body));
                    StatusCode::OK
                }),
            )
            .route("/api/restart", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .with_state(captured)
    }

    #[tokio::test]
    async fn test_fetches_and_normalizes() {
        let captured = Captured::default();
        let base = spawn_backend(fake_backend(captured)).await;
        let gateway = HttpGateway::new(&base, Duration::from_secs(2)).unwrap();

        let telemetry = gateway.fetch_telemetry().await.unwrap();
        assert_eq!(telemetry.risk.safe, 990);
        assert_eq!(telemetry.avg_response_time, 12.5);

        let page = gateway.fetch_logs(1, 50).await.unwrap();
        assert_eq!(page.logs[0].id, "p1-s50");
        assert_eq!(page.logs[0].level, LogLevel::Warning);

        let settings = gateway.fetch_settings().await.unwrap();
        assert_eq!(settings.kernel.worker_threads, 6);
    }

    #[tokio::test]
    async fn test_persist_config_posts_items() {
        let captured = Captured::default();
        let base = spawn_backend(fake_backend(captured.clone())).await;
        let gateway = HttpGateway::new(&base, Duration::from_secs(2)).unwrap();

        let payload = PersistPayload::for_section(&ConfigSnapshot::default(), Section::Kernel);
        tokio_test::assert_ok!(gateway.persist(payload).await);

        let bodies = captured.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let items = bodies[0].1["items"].as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], json!({"key": "kernel_worker_threads", "value": "4"}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let base = spawn_backend(fake_backend(Captured::default())).await;
        let gateway = HttpGateway::new(&base, Duration::from_secs(2)).unwrap();

        let err = gateway.restart().await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Status { path: "/api/restart".to_string(), status: 503 }
        );

        // No route for prompts on this fake.
        let payload = PersistPayload::for_section(&ConfigSnapshot::default(), Section::Prompts);
        assert!(matches!(
            gateway.persist(payload).await,
            Err(GatewayError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let gateway = HttpGateway::new("127.0.0.1:1", Duration::from_millis(200)).unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:1");
        tokio_test::assert_err!(gateway.fetch_telemetry().await);
    }
}
