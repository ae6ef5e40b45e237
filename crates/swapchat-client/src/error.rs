use swapchat_core::TransportError;
use swapchat_proto::ProtocolError;
use thiserror::Error;

/// Errors from the REST client and relay transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Request could not be sent or the connection failed.
    #[error("http error: {0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `message` from the error body, or the status reason
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Backend URL cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Relay transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Relay sent an undecodable packet.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Whether the backend rejected the login cookie.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() { Self::Decode(err.to_string()) } else { Self::Http(err.to_string()) }
    }
}
