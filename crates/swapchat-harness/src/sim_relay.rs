//! In-memory relay for simulation.
//!
//! Plays the server side of the realtime protocol with a real RSA key pair.
//! Text arrives encrypted to the relay key, is decrypted, stored in the
//! clear and re-encrypted for every recipient's session key, so the full
//! key exchange runs end to end without a network.
//!
//! Every delivery is encoded as an Engine.IO text frame, so clients decode
//! exactly what a real socket would hand them.
//!
//! Faults are injected explicitly: withheld history, corrupted history
//! entries, an unreadable relay key, corrupt live messages, raw event
//! payloads and disconnects.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rand_chacha::ChaCha20Rng;
use swapchat_core::{TransportError, env::Environment};
use swapchat_crypto::{CryptoError, KeyPair, RsaPublicKey, encrypt_for, generate_key_pair, import_public_key};
use serde_json::Value;
use swapchat_proto::{
    ClientEvent, EnginePacket, HistorySnapshot, MessageKind, NAMESPACE, OutgoingContent, ProtocolError, RelayEvent,
    SocketPacket, Timestamp, WireMessage,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::SimEnv;

/// Base URL for uploaded files.
pub const FILE_HOST: &str = "https://files.sim.invalid";

/// Connection handle inside the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// A client event as the relay received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Authenticated user id of the sender
    pub user: String,
    /// Connection it arrived on
    pub connection: ConnectionId,
    /// The event
    pub event: ClientEvent,
}

/// Stored message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredBody {
    /// Plaintext
    Text(String),
    /// File URL
    File(String),
    /// Deleted by its author
    Deleted,
}

/// A message kept by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Author user id
    pub from: String,
    /// Body
    pub body: StoredBody,
    /// Acceptance time
    pub timestamp: i64,
}

#[derive(Debug)]
struct Peer {
    user: String,
    to: Option<String>,
    key: Option<RsaPublicKey>,
    outbox: mpsc::UnboundedSender<String>,
}

#[derive(Debug, Default)]
struct Conversation {
    messages: Vec<StoredMessage>,
    archived: bool,
}

/// In-memory relay.
#[derive(Debug)]
pub struct SimRelay {
    env: SimEnv,
    keys: KeyPair,
    rng: ChaCha20Rng,
    tokens: HashMap<String, String>,
    peers: HashMap<ConnectionId, Peer>,
    next_connection: u64,
    conversations: HashMap<(String, String), Conversation>,
    received: Vec<Received>,
    withhold_history: bool,
    withhold_echoes: bool,
    corrupt_history: BTreeSet<usize>,
    corrupt_relay_key: bool,
}

/// Engine.IO text frame carrying `packet`.
fn frame_for(packet: &SocketPacket) -> Result<String, ProtocolError> {
    EnginePacket::Message(packet.encode()?).encode()
}

fn pair(a: &str, b: &str) -> (String, String) {
    if a <= b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) }
}

impl SimRelay {
    /// Relay with a fresh key pair drawn from `env`.
    pub fn new(env: SimEnv) -> Result<Self, CryptoError> {
        let keys = generate_key_pair(&mut env.rng())?;
        let rng = env.rng();
        Ok(Self {
            env,
            keys,
            rng,
            tokens: HashMap::new(),
            peers: HashMap::new(),
            next_connection: 0,
            conversations: HashMap::new(),
            received: Vec::new(),
            withhold_history: false,
            withhold_echoes: false,
            corrupt_history: BTreeSet::new(),
            corrupt_relay_key: false,
        })
    }

    /// Accept `token` as the login of `user`.
    pub fn register_token(&mut self, token: impl Into<String>, user: impl Into<String>) {
        self.tokens.insert(token.into(), user.into());
    }

    /// Relay public key in PEM form.
    pub fn public_key_pem(&self) -> &str {
        self.keys.public_key_pem()
    }

    /// Store a message between `from` and `to` without delivering it.
    pub fn seed(&mut self, from: &str, to: &str, body: StoredBody) {
        let timestamp = self.env.now_millis();
        self.conversation(from, to).messages.push(StoredMessage { from: from.to_string(), body, timestamp });
    }

    /// Store a text message dated `timestamp`.
    pub fn seed_text_at(&mut self, from: &str, to: &str, text: &str, timestamp: i64) {
        self.conversation(from, to).messages.push(StoredMessage {
            from: from.to_string(),
            body: StoredBody::Text(text.to_string()),
            timestamp,
        });
    }

    /// Mark the conversation as archived.
    pub fn set_archived(&mut self, a: &str, b: &str, archived: bool) {
        self.conversation(a, b).archived = archived;
    }

    /// Never answer `previous_chats`.
    pub fn withhold_history(&mut self, withhold: bool) {
        self.withhold_history = withhold;
    }

    /// Store sends without echoing them back to their author.
    pub fn withhold_echoes(&mut self, withhold: bool) {
        self.withhold_echoes = withhold;
    }

    /// Send garbage instead of ciphertext for history entry `index`.
    pub fn corrupt_history_at(&mut self, index: usize) {
        self.corrupt_history.insert(index);
    }

    /// Send an unreadable key in history snapshots.
    pub fn corrupt_relay_key(&mut self, corrupt: bool) {
        self.corrupt_relay_key = corrupt;
    }

    /// Open a connection for the holder of `token`.
    pub fn connect(
        &mut self,
        token: &str,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<String>), TransportError> {
        let Some(user) = self.tokens.get(token).cloned() else {
            warn!("relay refused unknown token");
            return Err(TransportError::Rejected("unauthorized".to_string()));
        };

        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        let (outbox, inbox) = mpsc::unbounded_channel();
        info!(%user, connection = id.0, "relay accepted connection");
        self.peers.insert(id, Peer { user, to: None, key: None, outbox });
        Ok((id, inbox))
    }

    /// Drop a connection. Idempotent.
    pub fn close(&mut self, id: ConnectionId) {
        if let Some(peer) = self.peers.remove(&id) {
            debug!(user = %peer.user, connection = id.0, "relay connection closed by client");
        }
    }

    /// Process an event from a client.
    pub fn receive(&mut self, id: ConnectionId, event: ClientEvent) -> Result<(), TransportError> {
        let Some(peer) = self.peers.get(&id) else {
            return Err(TransportError::Closed);
        };
        let user = peer.user.clone();
        self.received.push(Received { user: user.clone(), connection: id, event: event.clone() });
        debug!(%user, event = event.name(), "relay received");

        match event {
            ClientEvent::JoinConversation { to, public_key } => self.on_join(id, &user, to, &public_key),
            ClientEvent::PreviousChats { to } => self.on_previous_chats(id, &user, &to),
            ClientEvent::MessageSent { to, content } => self.on_message(&user, &to, content),
            ClientEvent::Offline { .. } => {
                if let Some(peer) = self.peers.get_mut(&id) {
                    peer.to = None;
                }
            },
        }
        Ok(())
    }

    fn on_join(&mut self, id: ConnectionId, user: &str, to: String, public_key: &str) {
        if to == user {
            self.deliver(id, RelayEvent::CantConnectWithSelf);
            return;
        }
        let key = match import_public_key(public_key) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(%err, %user, "client sent unreadable public key");
                None
            },
        };
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.to = Some(to);
            peer.key = key;
        }
    }

    fn on_previous_chats(&mut self, id: ConnectionId, user: &str, to: &str) {
        if self.withhold_history {
            debug!(%user, "withholding history");
            return;
        }
        let Some(key) = self.peers.get(&id).and_then(|peer| peer.key.clone()) else {
            warn!(%user, "history requested before join");
            return;
        };

        let (messages, archived) = self
            .conversations
            .get(&pair(user, to))
            .map(|c| (c.messages.clone(), c.archived))
            .unwrap_or_default();

        let mut chats = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let mut wire = self.wire_for(&key, message, user);
            if self.corrupt_history.contains(&index) && wire.kind == MessageKind::Text {
                wire.content = "bm90IGEgY2lwaGVydGV4dA==".to_string();
            }
            chats.push(wire);
        }

        let server_public_key = if self.corrupt_relay_key {
            "-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----".to_string()
        } else {
            self.keys.public_key_pem().to_string()
        };
        self.deliver(id, RelayEvent::PreviousChats(HistorySnapshot { chats, archived, server_public_key }));
    }

    fn on_message(&mut self, user: &str, to: &str, content: OutgoingContent) {
        let body = match content {
            OutgoingContent::Text { ciphertext } => match self.keys.decrypt(&ciphertext) {
                Ok(text) => StoredBody::Text(text),
                Err(err) => {
                    warn!(%err, %user, "dropping message the relay cannot read");
                    return;
                },
            },
            OutgoingContent::File(file) => {
                let id = self.received.len();
                StoredBody::File(format!("{FILE_HOST}/{id}/{}", file.name))
            },
        };
        let message = StoredMessage { from: user.to_string(), body, timestamp: self.env.now_millis() };
        self.conversation(user, to).messages.push(message.clone());

        let recipients: Vec<(ConnectionId, RsaPublicKey, String)> = self
            .peers
            .iter()
            .filter(|(_, peer)| {
                (peer.user == user && peer.to.as_deref() == Some(to) && !self.withhold_echoes)
                    || (peer.user == to && peer.to.as_deref() == Some(user))
            })
            .filter_map(|(id, peer)| peer.key.clone().map(|key| (*id, key, peer.user.clone())))
            .collect();

        for (id, key, viewer) in recipients {
            let wire = self.wire_for(&key, &message, &viewer);
            self.deliver(id, RelayEvent::MessageReceived(wire));
        }
    }

    fn wire_for(&mut self, key: &RsaPublicKey, message: &StoredMessage, viewer: &str) -> WireMessage {
        let (kind, content, deleted) = match &message.body {
            StoredBody::Text(text) => match encrypt_for(key, text, &mut self.rng) {
                Ok(ciphertext) => (MessageKind::Text, ciphertext, false),
                Err(err) => {
                    warn!(%err, "cannot re-encrypt stored message");
                    (MessageKind::Text, String::new(), false)
                },
            },
            StoredBody::File(url) => (MessageKind::File, url.clone(), false),
            StoredBody::Deleted => (MessageKind::Text, String::new(), true),
        };
        WireMessage {
            kind,
            content,
            timestamp: Timestamp::Millis(message.timestamp),
            by_me: message.from == viewer,
            deleted,
        }
    }

    fn deliver(&mut self, id: ConnectionId, event: RelayEvent) {
        let packet = match SocketPacket::from_relay_event(NAMESPACE, &event) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%err, event = event.name(), "cannot encode relay event");
                return;
            },
        };
        self.deliver_packet(id, &packet);
    }

    fn deliver_packet(&mut self, id: ConnectionId, packet: &SocketPacket) {
        let frame = match frame_for(packet) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "cannot encode relay frame");
                return;
            },
        };
        if let Some(peer) = self.peers.get(&id) {
            if peer.outbox.send(frame).is_err() {
                debug!(connection = id.0, "client stopped listening");
            }
        }
    }

    fn conversation(&mut self, a: &str, b: &str) -> &mut Conversation {
        self.conversations.entry(pair(a, b)).or_default()
    }

    /// Send a message with unreadable ciphertext to every connection of
    /// `user`, as if from their counterpart.
    pub fn inject_corrupt(&mut self, user: &str) {
        let timestamp = self.env.now_millis();
        let targets = self.connections_of(user);
        for id in targets {
            let wire = WireMessage {
                kind: MessageKind::Text,
                content: "AAAA".to_string(),
                timestamp: Timestamp::Millis(timestamp),
                by_me: false,
                deleted: false,
            };
            self.deliver(id, RelayEvent::MessageReceived(wire));
        }
    }

    /// Send event `name` with an arbitrary JSON payload to every connection
    /// of `user`.
    pub fn inject_event(&mut self, user: &str, name: &str, args: Value) {
        let packet =
            SocketPacket::Event { namespace: NAMESPACE.to_string(), ack_id: None, name: name.to_string(), args: vec![args] };
        for id in self.connections_of(user) {
            self.deliver_packet(id, &packet);
        }
    }

    fn connections_of(&self, user: &str) -> Vec<ConnectionId> {
        self.peers.iter().filter(|(_, peer)| peer.user == user).map(|(id, _)| *id).collect()
    }

    /// Drop every connection of `user`, telling them why.
    pub fn disconnect(&mut self, user: &str, reason: &str) {
        let targets = self.connections_of(user);
        for id in targets {
            self.deliver(id, RelayEvent::Disconnect { reason: reason.to_string() });
            self.peers.remove(&id);
        }
        info!(%user, %reason, "relay disconnected user");
    }

    /// Every event received, in order.
    pub fn received(&self) -> &[Received] {
        &self.received
    }

    /// Events received from `user`.
    pub fn received_from(&self, user: &str) -> Vec<ClientEvent> {
        self.received.iter().filter(|r| r.user == user).map(|r| r.event.clone()).collect()
    }

    /// Public keys `user` joined with, in order.
    pub fn joins(&self, user: &str) -> Vec<String> {
        self.received_from(user)
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::JoinConversation { public_key, .. } => Some(public_key),
                _ => None,
            })
            .collect()
    }

    /// Number of `message_sent` events from `user`.
    pub fn sends_from(&self, user: &str) -> usize {
        self.received_from(user).iter().filter(|e| matches!(e, ClientEvent::MessageSent { .. })).count()
    }

    /// Whether `user` ever reported going offline.
    pub fn went_offline(&self, user: &str) -> bool {
        self.received_from(user).iter().any(|e| matches!(e, ClientEvent::Offline { .. }))
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    /// Stored conversation between `a` and `b`.
    pub fn history(&self, a: &str, b: &str) -> Vec<StoredMessage> {
        self.conversations.get(&pair(a, b)).map(|c| c.messages.clone()).unwrap_or_default()
    }
}

/// Relay shared between connections and the test.
#[derive(Debug, Clone)]
pub struct SharedSimRelay(Arc<Mutex<SimRelay>>);

impl SharedSimRelay {
    /// Share `relay`.
    pub fn new(relay: SimRelay) -> Self {
        Self(Arc::new(Mutex::new(relay)))
    }

    /// Lock the relay. A poisoned lock is recovered; relay state stays
    /// consistent between calls.
    pub fn lock(&self) -> MutexGuard<'_, SimRelay> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a shared relay with keys drawn from `env`.
pub fn create_shared_relay(env: SimEnv) -> Result<SharedSimRelay, CryptoError> {
    SimRelay::new(env).map(SharedSimRelay::new)
}
