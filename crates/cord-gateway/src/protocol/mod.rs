//! Gateway protocol definitions
//!
//! Opcodes, close codes, the frame envelope and the control payloads.

mod close_codes;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{classify, CloseClassification, CloseCode, CloseFrame, POLICY_VIOLATION};
pub use intents::Intents;
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload, ShardInfo,
};
