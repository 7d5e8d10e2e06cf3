//! Sentinel Console - dashboard state engine
//!
//! Keeps live telemetry and operational settings in sync with a log-analysis
//! backend, masking outages with synthetic data in simulation mode.

mod config;
mod engine;
mod gateway;
mod model;
mod scheduler;
mod settings;
mod synthetic;
mod telemetry;
mod timefmt;
mod web;

use config::EngineConfig;
use engine::Engine;
use gateway::HttpGateway;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sentinel_console=info".parse()?)
            .add_directive("tower_http=info".parse()?))
        .init();

    // Load configuration
    let cfg = EngineConfig::load();
    tracing::info!("Starting Sentinel Console on port {}...", cfg.http_port);

    let gateway = HttpGateway::new(&cfg.backend_url, cfg.request_timeout)?;
    tracing::info!(
        "Backend at {} (simulation {})",
        gateway.base_url(),
        if cfg.simulation { "on" } else { "off" }
    );
    let port = cfg.http_port;
    let autostart = cfg.autostart;
    let engine = Engine::new(cfg, Arc::new(gateway));

    // Settings are best-effort at boot; defaults stay in place until a load succeeds.
    if let Err(e) = engine.load_settings().await {
        tracing::warn!("Initial settings load failed: {}", e);
    }

    if autostart {
        engine.set_polling(true);
    }

    let server = Server::new(engine.clone(), port);
    let result = server.start().await;
    engine.shutdown();
    result
}
