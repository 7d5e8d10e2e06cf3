//! Consumer API: read-only state views and engine commands over HTTP.

mod handlers;

use crate::engine::Engine;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

/// Web server for the console engine.
pub struct Server {
    state: AppState,
    port: u16,
}

impl Server {
    pub fn new(engine: Engine, port: u16) -> Self {
        Self {
            state: AppState { engine },
            port,
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            // State views
            .route("/state/telemetry", get(handlers::handle_telemetry))
            .route("/state/settings", get(handlers::handle_settings))
            .route("/events", get(handlers::handle_events))
            // Commands
            .route("/commands/polling", post(handlers::handle_polling))
            .route("/commands/log-stream", post(handlers::handle_log_stream))
            .route("/commands/simulation", post(handlers::handle_simulation))
            .route("/commands/settings/load", post(handlers::handle_load_settings))
            .route("/commands/settings/edit", post(handlers::handle_edit_settings))
            .route("/commands/settings/save", post(handlers::handle_save_settings))
            .route("/commands/restart", post(handlers::handle_restart))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
