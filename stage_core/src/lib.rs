use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a live spatial audio engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only the first 8 characters for brevity
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A sound source tracked by the engine: a remote user or a local media player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityId {
    /// Remote user, keyed by the uid it joined the channel with
    User(u32),
    /// Media player, keyed by its player id
    Player(i32),
}

impl EntityId {
    pub fn is_user(&self) -> bool {
        matches!(self, EntityId::User(_))
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::User(uid) => write!(f, "user:{}", uid),
            EntityId::Player(id) => write!(f, "player:{}", id),
        }
    }
}

/// The channel connection an operation applies to.
///
/// `Connection::default()` is the primary connection used by every operation
/// that does not name one explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Connection {
    /// Channel name
    pub channel_id: String,
    /// Local user id within that channel
    pub local_uid: u32,
}

impl Connection {
    pub fn new(channel_id: impl Into<String>, local_uid: u32) -> Self {
        Self {
            channel_id: channel_id.into(),
            local_uid,
        }
    }

    pub fn is_default(&self) -> bool {
        self.channel_id.is_empty() && self.local_uid == 0
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default() {
            write!(f, "<default>")
        } else {
            write!(f, "{}#{}", self.channel_id, self.local_uid)
        }
    }
}

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown entity: {0}")]
    InvalidId(EntityId),

    #[error("Spatial audio engine is not initialized")]
    NotInitialized,

    #[error("A spatial audio engine instance is already live")]
    AlreadyInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Catch-all for other errors
}

/// Signed result codes reported across the binding boundary. Zero is success.
pub mod codes {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = -1;
    pub const INVALID_PARAMETER: i32 = -2;
    pub const INVALID_FRAME: i32 = -3;
    pub const INVALID_ID: i32 = -4;
    pub const ALREADY_INITIALIZED: i32 = -5;
    pub const NOT_INITIALIZED: i32 = -7;
}

impl Error {
    /// Negative result code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidParameter(_) => codes::INVALID_PARAMETER,
            Error::InvalidFrame(_) => codes::INVALID_FRAME,
            Error::InvalidId(_) => codes::INVALID_ID,
            Error::AlreadyInitialized => codes::ALREADY_INITIALIZED,
            Error::NotInitialized => codes::NOT_INITIALIZED,
            _ => codes::FAILED,
        }
    }
}

/// Collapse an operation result into its signed result code.
pub fn result_code<T>(result: &Result<T, Error>) -> i32 {
    match result {
        Ok(_) => codes::OK,
        Err(e) => e.code(),
    }
}

// Output format handed to the mixer
pub const SAMPLE_RATE: u32 = 48000;
pub const OUTPUT_CHANNELS: u16 = 2; // Interleaved stereo

/// Represents a buffer of audio samples.
/// Samples are typically f32.
pub type AudioBuffer = Vec<f32>;

pub mod events;

// Re-export commonly used types from events
pub use events::{EngineEvent, RtcEvent};
