//! WebSocket close codes
//!
//! Gateway close codes and how each one affects the next connection attempt.

/// Close codes the gateway may send when it ends a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

/// Standard WebSocket policy violation code
pub const POLICY_VIOLATION: u16 = 1008;

/// What a close means for the stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClassification {
    /// Keep session id and sequence, RESUME on the next connection
    Resume,
    /// Drop session id and sequence, IDENTIFY on the next connection
    Reidentify,
    /// Reconnecting cannot help; stop and report
    Fatal,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Session impact of this close code
    #[must_use]
    pub const fn classification(self) -> CloseClassification {
        match self {
            Self::AuthenticationFailed | Self::InvalidSequence | Self::SessionTimedOut => {
                CloseClassification::Reidentify
            }
            Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseClassification::Fatal,
            _ => CloseClassification::Resume,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode",
            Self::DecodeError => "Decode error",
            Self::NotAuthenticated => "Payload sent before identifying",
            Self::AuthenticationFailed => "Invalid token",
            Self::AlreadyAuthenticated => "Identified more than once",
            Self::InvalidSequence => "Invalid sequence on resume",
            Self::RateLimited => "Payloads sent too quickly",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Classify any raw close code, including the standard WebSocket range
///
/// Codes the gateway does not define, such as 1000 or 1006, keep the session.
#[must_use]
pub fn classify(code: u16) -> CloseClassification {
    if code == POLICY_VIOLATION {
        return CloseClassification::Reidentify;
    }
    CloseCode::from_u16(code).map_or(CloseClassification::Resume, CloseCode::classification)
}

/// A close code plus reason, in either direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    /// The server will invalidate the session
    pub const NORMAL: u16 = 1000;
    /// Any code outside 1000/1001 keeps the session resumable
    pub const RESUME: u16 = 4000;
    /// Reported when the peer closed without sending a code
    pub const NO_STATUS: u16 = 1005;

    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close that discards the session
    #[must_use]
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "client shutdown")
    }

    /// Close that keeps the session for a later RESUME
    #[must_use]
    pub fn resume(reason: impl Into<String>) -> Self {
        Self::new(Self::RESUME, reason)
    }

    #[must_use]
    pub fn classification(&self) -> CloseClassification {
        classify(self.code)
    }
}

impl std::fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.reason)
        }
    }
}
