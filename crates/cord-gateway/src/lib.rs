//! # cord-gateway
//!
//! Discord gateway client: the session state machine with identify, resume and
//! backoff driven reconnects, plus a tokio shard driver over WebSocket.

pub mod error;
pub mod protocol;
pub mod retry;
pub mod session;
pub mod shard;
pub mod transport;

pub use error::{GatewayError, GatewayResult, TransportError};
pub use session::{DispatchEvent, GatewayEvent, GatewayStateChange, SessionState};
pub use shard::{Shard, ShardConfig};
