//! Relay transport abstraction.
//!
//! The session never touches sockets. A runtime obtains a
//! [`RelayConnection`] from a [`RelayConnector`], forwards
//! [`SessionAction::Emit`](crate::SessionAction::Emit) to it and feeds
//! received events back into the session.

use async_trait::async_trait;
use swapchat_proto::{ClientEvent, RelayEvent};

use crate::error::TransportError;

/// Credentials and address of the realtime relay.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayAuth {
    /// Relay endpoint
    pub url: String,
    /// Socket.IO namespace
    pub namespace: String,
    /// Bearer token from the login cookie; empty when absent
    pub token: String,
}

impl std::fmt::Debug for RelayAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayAuth")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("token", &if self.token.is_empty() { "<none>" } else { "<redacted>" })
            .finish()
    }
}

/// Opens relay connections.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    /// Connection type produced.
    type Connection: RelayConnection;

    /// Connect and join the namespace.
    ///
    /// # Errors
    ///
    /// `Connect` if the relay is unreachable, `Rejected` if the namespace
    /// handshake is refused.
    async fn connect(&self, auth: &RelayAuth) -> Result<Self::Connection, TransportError>;
}

/// An open relay connection.
#[async_trait]
pub trait RelayConnection: Send {
    /// Send an event.
    ///
    /// # Errors
    ///
    /// `Closed` once the connection has ended.
    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError>;

    /// Next event from the relay, `None` once closed.
    async fn recv(&mut self) -> Option<RelayEvent>;

    /// Leave the namespace and close. Idempotent.
    async fn close(&mut self);
}
