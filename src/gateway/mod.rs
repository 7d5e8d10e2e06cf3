//! Backend gateway: typed access to the remote dashboard API.
//!
//! All inbound payloads are normalized here; the rest of the engine only sees
//! model types.

mod codec;
mod http;
mod wire;

pub use codec::*;
pub use http::*;
pub use wire::*;

use crate::model::{ConfigSnapshot, DashboardSnapshot, LogPage};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Gateway error types. Every variant is a transient failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// The remote side of the engine.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_telemetry(&self) -> Result<DashboardSnapshot, GatewayError>;

    async fn fetch_logs(&self, page: u32, page_size: u32) -> Result<LogPage, GatewayError>;

    async fn fetch_settings(&self) -> Result<ConfigSnapshot, GatewayError>;

    /// Replace one section on the backend.
    async fn persist(&self, payload: PersistPayload) -> Result<(), GatewayError>;

    /// Ask the backend process to restart.
    async fn restart(&self) -> Result<(), GatewayError>;
}
