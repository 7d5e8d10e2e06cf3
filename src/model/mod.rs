//! Model types shared by the engine components.
//!
//! Telemetry types are transient and bounded; settings types mirror the
//! backend configuration sections.

mod settings;
mod telemetry;

pub use settings::*;
pub use telemetry::*;
