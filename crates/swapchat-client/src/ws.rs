//! Socket.IO relay transport over WebSocket.
//!
//! The connector performs the Engine.IO open and Socket.IO namespace
//! handshakes inline, then hands the socket to two tasks:
//!
//! - the writer drains an outbound queue into the socket
//! - the reader answers heartbeats, decodes events and forwards them
//!
//! A silent connection (no frame within `pingInterval + pingTimeout`) is
//! treated as lost, as the browser client does.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde_json::json;
use swapchat_core::{RelayAuth, RelayConnection, RelayConnector, TransportError};
use swapchat_proto::{ClientEvent, EnginePacket, OpenHandshake, RelayEvent, SocketPacket};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound queue depth.
const OUTBOUND_CAPACITY: usize = 64;

/// Inbound event queue depth.
const INBOUND_CAPACITY: usize = 256;

enum Outbound {
    Frame(String),
    Close,
}

/// Opens Socket.IO connections to the relay.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    handshake_timeout: Duration,
}

impl SocketIoConnector {
    /// Connector with the given handshake timeout.
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for SocketIoConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl RelayConnector for SocketIoConnector {
    type Connection = SocketIoConnection;

    async fn connect(&self, auth: &RelayAuth) -> Result<Self::Connection, TransportError> {
        timeout(self.handshake_timeout, handshake(auth))
            .await
            .map_err(|_| TransportError::Connect("handshake timed out".to_string()))?
    }
}

async fn handshake(auth: &RelayAuth) -> Result<SocketIoConnection, TransportError> {
    let (socket, _response) =
        connect_async(auth.url.as_str()).await.map_err(|e| TransportError::Connect(e.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    let open = loop {
        match next_packet(&mut stream).await? {
            EnginePacket::Open(open) => break open,
            EnginePacket::Noop => {},
            other => return Err(TransportError::Connect(format!("expected open packet, got {other:?}"))),
        }
    };
    debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine session opened");

    let data = if auth.token.is_empty() { json!({}) } else { json!({ "token": auth.token }) };
    let connect = SocketPacket::Connect { namespace: auth.namespace.clone(), data: Some(data) };
    send_frame(&mut sink, message_frame(&connect)?).await?;

    loop {
        match next_packet(&mut stream).await? {
            EnginePacket::Ping(payload) => send_frame(&mut sink, EnginePacket::Pong(payload).encode()?).await?,
            EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
                SocketPacket::Connect { namespace, .. } if namespace == auth.namespace => break,
                SocketPacket::ConnectError { message, .. } => return Err(TransportError::Rejected(message)),
                other => debug!(?other, "ignoring packet during namespace handshake"),
            },
            EnginePacket::Close => return Err(TransportError::Closed),
            _ => {},
        }
    }
    info!(namespace = %auth.namespace, "connected to relay");

    Ok(SocketIoConnection::spawn(auth.namespace.clone(), &open, sink, stream))
}

/// An open relay connection.
pub struct SocketIoConnection {
    namespace: String,
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Receiver<RelayEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    closed: bool,
}

impl std::fmt::Debug for SocketIoConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketIoConnection")
            .field("namespace", &self.namespace)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SocketIoConnection {
    fn spawn(namespace: String, open: &OpenHandshake, sink: SplitSink<Socket, Message>, stream: SplitStream<Socket>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let idle = Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout));

        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_loop(stream, namespace.clone(), idle, outbound_tx.clone(), inbound_tx));

        Self { namespace, outbound: outbound_tx, inbound: inbound_rx, reader, writer, closed: false }
    }
}

#[async_trait]
impl RelayConnection for SocketIoConnection {
    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let frame = message_frame(&SocketPacket::from_client_event(&self.namespace, &event))?;
        self.outbound.send(Outbound::Frame(frame)).await.map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<RelayEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let leave = SocketPacket::Disconnect { namespace: self.namespace.clone() };
        if let Ok(frame) = message_frame(&leave) {
            let _ = self.outbound.send(Outbound::Frame(frame)).await;
        }
        let _ = self.outbound.send(Outbound::Close).await;
        self.reader.abort();
        debug!(namespace = %self.namespace, "relay connection closed");
    }
}

impl Drop for SocketIoConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn write_loop(mut sink: SplitSink<Socket, Message>, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(item) = outbound.recv().await {
        let result = match item {
            Outbound::Frame(frame) => sink.send(Message::Text(frame)).await,
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            },
        };
        if let Err(err) = result {
            warn!(%err, "relay write failed");
            break;
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<Socket>,
    namespace: String,
    idle: Duration,
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Sender<RelayEvent>,
) {
    let reason = loop {
        let frame = match timeout(idle, stream.next()).await {
            Err(_) => break "ping timeout".to_string(),
            Ok(None) => break "transport close".to_string(),
            Ok(Some(Err(err))) => break format!("transport error: {err}"),
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(frame) => {
                break frame.map_or_else(|| "transport close".to_string(), |f| f.reason.to_string());
            },
            Message::Binary(_) => {
                warn!("ignoring binary frame");
                continue;
            },
            _ => continue,
        };

        let packet = match EnginePacket::decode(&text) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, "dropping undecodable frame");
                continue;
            },
        };

        match packet {
            EnginePacket::Ping(payload) => {
                if let Ok(pong) = EnginePacket::Pong(payload).encode() {
                    let _ = outbound.send(Outbound::Frame(pong)).await;
                }
            },
            EnginePacket::Close => break "transport close".to_string(),
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(packet @ SocketPacket::Event { .. }) => {
                    let Some(event) = packet.into_relay_event(&namespace) else {
                        debug!("ignoring event for another namespace");
                        continue;
                    };
                    if let RelayEvent::Malformed { name, reason } = &event {
                        warn!(%name, %reason, "relay event payload did not decode");
                    }
                    if inbound.send(event).await.is_err() {
                        return;
                    }
                },
                Ok(SocketPacket::Disconnect { namespace: ns }) if ns == namespace => {
                    break "io server disconnect".to_string();
                },
                Ok(SocketPacket::ConnectError { message, .. }) => break message,
                Ok(other) => debug!(?other, "ignoring packet"),
                Err(err) => warn!(%err, "dropping undecodable packet"),
            },
            _ => {},
        }
    };

    info!(%reason, "relay connection lost");
    let _ = inbound.send(RelayEvent::Disconnect { reason }).await;
}

fn message_frame(packet: &SocketPacket) -> Result<String, TransportError> {
    Ok(EnginePacket::Message(packet.encode()?).encode()?)
}

async fn next_packet(stream: &mut SplitStream<Socket>) -> Result<EnginePacket, TransportError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(&text)?),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => {},
            Some(Err(err)) => return Err(TransportError::Connect(err.to_string())),
        }
    }
}

async fn send_frame(sink: &mut SplitSink<Socket, Message>, frame: String) -> Result<(), TransportError> {
    sink.send(Message::Text(frame)).await.map_err(|e| TransportError::Connect(e.to_string()))
}
