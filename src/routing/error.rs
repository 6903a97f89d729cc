use crate::routing::types::MessageKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Frame too short: need {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("Not spray-and-wait traffic (version {version}, magic {magic:?})")]
    ProtocolMismatch { version: u8, magic: [u8; 2] },

    #[error("Payload of {len} bytes exceeds the {max}-byte buffer")]
    PayloadTooLarge { len: usize, max: usize },
}

pub type WireResult<T> = Result<T, WireError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Queue is full (capacity: {0})")]
    QueueFull(usize),

    #[error("Entry already queued: {0}")]
    Duplicate(MessageKey),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
