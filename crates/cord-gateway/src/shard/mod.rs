//! Shard driver
//!
//! [`Shard`] spawns a task that runs the session machine against a
//! [`Transport`](crate::transport::Transport) and publishes [`GatewayEvent`]s.
//!
//! [`GatewayEvent`]: crate::session::GatewayEvent

mod config;
mod handle;
mod runner;

pub use config::{ShardConfig, ShardConfigBuilder, DEFAULT_GATEWAY_URL, DEFAULT_OUTBOUND_PER_MINUTE};
pub use handle::Shard;
