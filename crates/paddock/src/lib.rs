//! Core engine for a sim-racing league: result ingestion, scoring, skill
//! ratings, standings, and the penalty book.

pub mod config;
pub mod error;
pub mod league;
pub mod telemetry;

pub use config::{AppConfig, AppEnvironment, ConfigError, ServerConfig, TelemetryConfig};
pub use error::AppError;
pub use telemetry::TelemetryError;
