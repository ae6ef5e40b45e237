//! In-memory relay transport.
//!
//! Implements the core connector traits over a [`SharedSimRelay`]. Frames
//! the relay addresses to a connection travel through an unbounded channel,
//! so `recv` is cancellation safe, and are decoded here with the same codec
//! the WebSocket transport uses.

use async_trait::async_trait;
use swapchat_core::{RelayAuth, RelayConnection, RelayConnector, TransportError};
use swapchat_proto::{ClientEvent, EnginePacket, NAMESPACE, RelayEvent, SocketPacket};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::sim_relay::{ConnectionId, SharedSimRelay};

/// Opens connections to a simulated relay.
#[derive(Debug, Clone)]
pub struct SimConnector {
    relay: SharedSimRelay,
}

impl SimConnector {
    /// Connector for `relay`.
    pub fn new(relay: SharedSimRelay) -> Self {
        Self { relay }
    }

    /// The relay behind this connector.
    pub fn relay(&self) -> &SharedSimRelay {
        &self.relay
    }
}

#[async_trait]
impl RelayConnector for SimConnector {
    type Connection = SimConnection;

    async fn connect(&self, auth: &RelayAuth) -> Result<Self::Connection, TransportError> {
        let (id, inbox) = self.relay.lock().connect(&auth.token)?;
        Ok(SimConnection { id, relay: self.relay.clone(), inbox, closed: false })
    }
}

/// A connection to the simulated relay.
#[derive(Debug)]
pub struct SimConnection {
    id: ConnectionId,
    relay: SharedSimRelay,
    inbox: mpsc::UnboundedReceiver<String>,
    closed: bool,
}

impl SimConnection {
    /// Relay-side handle.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[async_trait]
impl RelayConnection for SimConnection {
    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.relay.lock().receive(self.id, event)
    }

    async fn recv(&mut self) -> Option<RelayEvent> {
        loop {
            let frame = self.inbox.recv().await?;
            let packet = match EnginePacket::decode(&frame) {
                Ok(EnginePacket::Message(data)) => SocketPacket::decode(&data),
                Ok(other) => {
                    debug!(?other, "ignoring engine packet");
                    continue;
                },
                Err(err) => Err(err),
            };
            match packet.map(|packet| packet.into_relay_event(NAMESPACE)) {
                Ok(Some(event)) => return Some(event),
                Ok(None) => debug!(connection = self.id.0, "ignoring packet outside namespace"),
                Err(err) => warn!(%err, connection = self.id.0, "dropping undecodable frame"),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.relay.lock().close(self.id);
        debug!(connection = self.id.0, "sim connection closed");
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.relay.lock().close(self.id);
        }
    }
}
