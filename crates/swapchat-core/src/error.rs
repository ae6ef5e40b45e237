//! Session and transport error types.

use swapchat_crypto::CryptoError;
use swapchat_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors returned by [`crate::Session::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Event is not valid in the current state.
    #[error("invalid state {state:?} for {operation}")]
    InvalidState {
        /// State when the event arrived
        state: SessionState,
        /// Operation that was attempted
        operation: String,
    },

    /// A user send was refused; the session itself is unaffected.
    #[error("send rejected: {0}")]
    SendRejected(SendRejection),

    /// Outgoing message could not be encrypted.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Why a send was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejection {
    /// History has not arrived yet.
    #[error("session is not active yet")]
    NotActive,

    /// The previous message has not been echoed back.
    #[error("previous message is still awaiting acknowledgement")]
    SendPending,

    /// The session has ended.
    #[error("session is disconnected")]
    Disconnected,

    /// Nothing to send after trimming.
    #[error("message is empty")]
    EmptyMessage,
}

/// Errors from relay transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not reach the relay.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Relay refused the namespace connection (bad or missing token).
    #[error("relay rejected connection: {0}")]
    Rejected(String),

    /// Connection is closed.
    #[error("connection closed")]
    Closed,

    /// Relay sent something that does not decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
