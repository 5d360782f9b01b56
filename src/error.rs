//! Error types shared by the bridge and its adapters

use thiserror::Error;

/// Errors raised at the bridge/adapter seams
///
/// The bridge never propagates these past a single message: each one is
/// logged where it is detected and the message is dropped.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid device command: {0}")]
    InvalidCommand(String),

    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
