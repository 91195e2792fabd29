//! Integration test utilities
//!
//! Mock Discord REST and gateway servers bound to ephemeral local ports, so
//! the real reqwest and WebSocket transports can be exercised end to end.

pub mod helpers;

pub use helpers::*;
