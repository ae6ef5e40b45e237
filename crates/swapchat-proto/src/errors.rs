//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Packet had no type prefix.
    #[error("empty packet")]
    EmptyPacket,

    /// Engine.IO packet type outside the v4 range.
    #[error("unknown engine.io packet type {0:?}")]
    UnknownEnginePacket(char),

    /// Socket.IO packet type outside the v5 range.
    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketPacket(char),

    /// Binary event and ack packets carry out-of-band attachments.
    #[error("binary socket.io packets are not supported")]
    UnsupportedBinary,

    /// Packet structure is invalid (missing event name, bad ack id, ...).
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// JSON body failed to parse or serialize.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    /// Event arguments did not match the expected shape.
    #[error("invalid arguments for event {event}: {reason}")]
    InvalidEventArgs {
        /// Event name
        event: String,
        /// Decoder error
        reason: String,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
