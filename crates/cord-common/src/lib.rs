//! # cord-common
//!
//! Shared configuration loading and telemetry setup for the gateway and REST crates.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, JitterMode, ReconnectConfig,
    RestConfig, SaturationPolicy, MIN_FIRST_BACKOFF_MS,
};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
