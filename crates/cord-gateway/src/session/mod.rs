//! Gateway session
//!
//! The lifecycle states, the events a shard publishes and the transition
//! function that drives identify, resume and reconnect.

mod events;
mod heartbeat;
mod machine;
mod state;

pub use events::{DispatchEvent, GatewayEvent, GatewayStateChange};
pub use heartbeat::Heartbeat;
pub use machine::{Action, Input, SessionMachine};
pub use state::{ConnectionOutcome, SessionState};
