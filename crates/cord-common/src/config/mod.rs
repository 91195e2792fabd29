//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, JitterMode, ReconnectConfig,
    RestConfig, SaturationPolicy, MIN_FIRST_BACKOFF_MS,
};
