//! Conversation session state machine.
//!
//! One [`Session`] exists per open conversation view. It owns the local key
//! pair, the relay's public key, the decrypted message list and the
//! pending-send guard.
//!
//! # Architecture: Action-Based State Machine
//!
//! - [`Session::handle`] accepts a [`SessionEvent`]
//! - it returns `Result<Vec<SessionAction>, SessionError>`
//! - the runtime executes actions (emit to the relay, render, navigate)
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐ keys + transport ┌─────────────────┐ previous_chats ┌────────┐
//! │ Connecting │─────────────────>│ AwaitingHistory │───────────────>│ Active │
//! └────────────┘                  └─────────────────┘                └────────┘
//!       │                                  │                             │
//!       │ cantConnectWithSelf, disconnect, transport failure, teardown   │
//!       ↓                                  ↓                             ↓
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                         Disconnected (terminal)                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Sending
//!
//! At most one message is in flight. A send sets the pending flag and the
//! relay's `byMe` echo clears it. Nothing is appended locally until the echo
//! arrives.

use std::fmt;

use swapchat_crypto::{KeyPair, RsaPublicKey, encrypt_for, import_public_key};
use swapchat_proto::{
    ClientEvent, FileData, HistorySnapshot, OutgoingContent, RelayEvent, WireMessage, events::names,
};
use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::{SendRejection, SessionError},
    gate::HistoryGate,
    history::{ChatMessage, open_history, open_message},
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport and the key pair
    Connecting,
    /// Join sent, waiting for the history snapshot
    AwaitingHistory,
    /// History applied; sends allowed
    Active,
    /// Ended; nothing further is processed
    Disconnected,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Counterpart resolved to the current user
    SelfConnect,
    /// Relay or transport dropped the connection
    TransportLost(String),
    /// History could not be obtained or its relay key was unusable
    HistoryUnavailable(String),
    /// User left the conversation view
    Teardown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConnect => f.write_str("cannot open a conversation with yourself"),
            Self::TransportLost(reason) => write!(f, "disconnected: {reason}"),
            Self::HistoryUnavailable(reason) => write!(f, "history unavailable: {reason}"),
            Self::Teardown => f.write_str("left conversation"),
        }
    }
}

/// The other participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterpart {
    /// Identifier used as `to` in every event
    pub to: String,
    /// Display name
    pub name: String,
    /// Avatar URL, if any
    pub profile_pic: Option<String>,
}

/// Session configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Whether this session closes the transport on teardown.
    ///
    /// Leave `false` when the runtime manages the connection lifecycle.
    pub owns_transport: bool,
}

/// Message composed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    /// Text, encrypted to the relay key before sending
    Text(String),
    /// File attachment, sent as-is
    File(FileData),
}

/// Inputs to the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Local key pair generation finished
    KeyPairReady(KeyPair),
    /// Transport handshake completed
    TransportConnected,
    /// Event received from the relay
    Relay(RelayEvent),
    /// User submitted a message
    Send(OutgoingMessage),
    /// Transport failed outside the relay protocol
    TransportFailed {
        /// Failure description
        reason: String,
    },
    /// User is leaving the conversation view
    Teardown,
}

/// Actions for the runtime to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this event to the relay
    Emit(ClientEvent),
    /// Session view changed
    Render,
    /// Leave the conversation view
    NavigateAway {
        /// Why the view was closed
        reason: CloseReason,
    },
    /// Show a disconnected notice; the view stays but is inert
    ShowDisconnected {
        /// Why the session ended
        reason: CloseReason,
    },
    /// Stop delivering relay events to this session
    DeregisterListeners,
    /// Close the relay connection
    CloseTransport,
}

/// State machine for one conversation.
pub struct Session<E: Environment> {
    env: E,
    config: SessionConfig,
    counterpart: Counterpart,
    state: SessionState,
    keys: Option<KeyPair>,
    transport_open: bool,
    join_sent: bool,
    relay_key: Option<RsaPublicKey>,
    messages: Vec<ChatMessage>,
    archived: bool,
    pending_send: bool,
    gate: HistoryGate,
    close_reason: Option<CloseReason>,
    listeners_released: bool,
}

impl<E: Environment> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("to", &self.counterpart.to)
            .field("state", &self.state)
            .field("messages", &self.messages.len())
            .field("pending_send", &self.pending_send)
            .finish_non_exhaustive()
    }
}

impl<E: Environment> Session<E> {
    /// Create a session in `Connecting`.
    pub fn new(env: E, counterpart: Counterpart, config: SessionConfig) -> Self {
        Self {
            env,
            config,
            counterpart,
            state: SessionState::Connecting,
            keys: None,
            transport_open: false,
            join_sent: false,
            relay_key: None,
            messages: Vec::new(),
            archived: false,
            pending_send: false,
            gate: HistoryGate::new(),
            close_reason: None,
            listeners_released: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Decrypted messages in display order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether the relay archived older messages.
    pub fn is_archived(&self) -> bool {
        self.archived
    }

    /// Whether a send awaits its echo.
    pub fn is_send_pending(&self) -> bool {
        self.pending_send
    }

    /// Whether a send would currently be accepted.
    pub fn can_send(&self) -> bool {
        self.state == SessionState::Active && !self.pending_send
    }

    /// The other participant.
    pub fn counterpart(&self) -> &Counterpart {
        &self.counterpart
    }

    /// Why the session ended, once `Disconnected`.
    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// Process one event.
    ///
    /// # Errors
    ///
    /// - `InvalidState` for a duplicate key pair or handshake
    /// - `SendRejected` when a send is not currently allowed
    /// - `Crypto` when outgoing text cannot be encrypted
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::KeyPairReady(keys) => self.on_key_pair(keys),
            SessionEvent::TransportConnected => self.on_transport_connected(),
            SessionEvent::Relay(event) => self.on_relay(event),
            SessionEvent::Send(message) => self.send(message),
            SessionEvent::TransportFailed { reason } => Ok(self.fail(reason)),
            SessionEvent::Teardown => Ok(self.teardown()),
        }
    }

    fn on_key_pair(&mut self, keys: KeyPair) -> Result<Vec<SessionAction>, SessionError> {
        if self.keys.is_some() {
            return Err(self.invalid("key_pair_ready"));
        }
        if self.state == SessionState::Disconnected {
            debug!(to = %self.counterpart.to, "key pair arrived after session ended");
            return Ok(vec![]);
        }

        self.keys = Some(keys);
        Ok(self.try_join())
    }

    fn on_transport_connected(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::Connecting if !self.transport_open => {
                self.transport_open = true;
                Ok(self.try_join())
            },
            SessionState::Disconnected => Ok(vec![]),
            _ => Err(self.invalid("transport_connected")),
        }
    }

    /// Join once both the transport and the key pair are ready.
    fn try_join(&mut self) -> Vec<SessionAction> {
        let Some(keys) = self.keys.as_ref() else {
            return vec![];
        };
        if !self.transport_open || self.join_sent {
            return vec![];
        }

        let to = self.counterpart.to.clone();
        self.join_sent = true;
        self.state = SessionState::AwaitingHistory;
        debug!(%to, "joined conversation, awaiting history");

        vec![
            SessionAction::Emit(ClientEvent::JoinConversation {
                to: to.clone(),
                public_key: keys.public_key_pem().to_string(),
            }),
            SessionAction::Emit(ClientEvent::PreviousChats { to }),
        ]
    }

    fn on_relay(&mut self, event: RelayEvent) -> Result<Vec<SessionAction>, SessionError> {
        if self.state == SessionState::Disconnected {
            debug!(event = event.name(), "dropping relay event after disconnect");
            return Ok(vec![]);
        }

        match event {
            RelayEvent::CantConnectWithSelf => Ok(self.reject_self_connect()),
            RelayEvent::Disconnect { reason } => Ok(self.fail(reason)),
            RelayEvent::PreviousChats(snapshot) => self.apply_history(snapshot),
            RelayEvent::MessageReceived(message) => Ok(self.receive(message)),
            RelayEvent::Unknown { name } => {
                debug!(%name, "ignoring unhandled relay event");
                Ok(vec![])
            },
            RelayEvent::Malformed { name, reason } => Ok(self.on_malformed(&name, reason)),
        }
    }

    /// An undecodable history snapshot ends the session while it is still
    /// awaited. Anything else is dropped.
    fn on_malformed(&mut self, name: &str, reason: String) -> Vec<SessionAction> {
        if name == names::PREVIOUS_CHATS && self.state == SessionState::AwaitingHistory {
            return self.fail(format!("undecodable history: {reason}"));
        }
        warn!(%name, %reason, state = ?self.state, "ignoring undecodable relay event");
        vec![]
    }

    fn reject_self_connect(&mut self) -> Vec<SessionAction> {
        info!(to = %self.counterpart.to, "relay refused conversation with self");
        self.close(CloseReason::SelfConnect);
        self.listeners_released = true;

        vec![SessionAction::DeregisterListeners, SessionAction::NavigateAway { reason: CloseReason::SelfConnect }]
    }

    /// Terminal failure. Before history has arrived it counts as a failed
    /// history fetch.
    fn fail(&mut self, reason: String) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return vec![];
        }

        let reason = match self.state {
            SessionState::AwaitingHistory => CloseReason::HistoryUnavailable(reason),
            _ => CloseReason::TransportLost(reason),
        };
        warn!(to = %self.counterpart.to, %reason, "session disconnected");

        self.transport_open = false;
        self.close(reason.clone());
        self.listeners_released = true;

        vec![SessionAction::ShowDisconnected { reason }, SessionAction::DeregisterListeners]
    }

    fn apply_history(&mut self, snapshot: HistorySnapshot) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::AwaitingHistory => {},
            SessionState::Active => {
                warn!(to = %self.counterpart.to, "ignoring duplicate history snapshot");
                return Ok(vec![]);
            },
            _ => {
                warn!(state = ?self.state, "ignoring history snapshot before join");
                return Ok(vec![]);
            },
        }

        let relay_key = match import_public_key(&snapshot.server_public_key) {
            Ok(key) => key,
            Err(err) => {
                warn!(%err, "relay public key rejected");
                let reason = CloseReason::HistoryUnavailable(err.to_string());
                self.close(reason.clone());
                self.listeners_released = true;
                return Ok(vec![SessionAction::ShowDisconnected { reason }, SessionAction::DeregisterListeners]);
            },
        };

        let Some(keys) = self.keys.as_ref() else {
            return Err(self.invalid("previous_chats"));
        };

        let count = snapshot.chats.len();
        self.messages = open_history(keys, snapshot.chats);
        self.archived = snapshot.archived;
        self.relay_key = Some(relay_key);
        self.state = SessionState::Active;

        let held = self.gate.open();
        debug!(count, held = held.len(), archived = self.archived, "history applied");
        for message in held {
            self.append(message);
        }

        Ok(vec![SessionAction::Render])
    }

    fn receive(&mut self, message: WireMessage) -> Vec<SessionAction> {
        match self.gate.admit(message) {
            Some(message) => {
                self.append(message);
                vec![SessionAction::Render]
            },
            None => {
                debug!(held = self.gate.held(), "holding message until history arrives");
                vec![]
            },
        }
    }

    fn append(&mut self, message: WireMessage) {
        let Some(keys) = self.keys.as_ref() else {
            return;
        };
        let message = open_message(keys, message);
        if message.by_me {
            self.pending_send = false;
        }
        self.messages.push(message);
    }

    fn send(&mut self, message: OutgoingMessage) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::Active => {},
            SessionState::Disconnected => return Err(SessionError::SendRejected(SendRejection::Disconnected)),
            _ => return Err(SessionError::SendRejected(SendRejection::NotActive)),
        }
        if self.pending_send {
            return Err(SessionError::SendRejected(SendRejection::SendPending));
        }

        let content = match message {
            OutgoingMessage::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(SessionError::SendRejected(SendRejection::EmptyMessage));
                }
                let Some(relay_key) = self.relay_key.as_ref() else {
                    return Err(self.invalid("send"));
                };
                let ciphertext = encrypt_for(relay_key, text, &mut self.env.rng())?;
                OutgoingContent::Text { ciphertext }
            },
            OutgoingMessage::File(file) => {
                if file.buffer.is_empty() {
                    return Err(SessionError::SendRejected(SendRejection::EmptyMessage));
                }
                OutgoingContent::File(file)
            },
        };

        self.pending_send = true;
        debug!(kind = ?content.kind(), "message sent, awaiting echo");

        Ok(vec![
            SessionAction::Emit(ClientEvent::MessageSent { to: self.counterpart.to.clone(), content }),
            SessionAction::Render,
        ])
    }

    fn teardown(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if self.state != SessionState::Disconnected {
            if self.join_sent {
                actions.push(SessionAction::Emit(ClientEvent::Offline { to: self.counterpart.to.clone() }));
            }
            self.close(CloseReason::Teardown);
        }

        if !self.listeners_released {
            self.listeners_released = true;
            actions.push(SessionAction::DeregisterListeners);
        }

        if self.config.owns_transport && self.transport_open {
            self.transport_open = false;
            actions.push(SessionAction::CloseTransport);
        }

        info!(to = %self.counterpart.to, "session torn down");
        actions
    }

    fn close(&mut self, reason: CloseReason) {
        debug!(from = ?self.state, %reason, "session closed");
        self.state = SessionState::Disconnected;
        self.pending_send = false;
        self.close_reason = Some(reason);
    }

    fn invalid(&self, operation: &str) -> SessionError {
        SessionError::InvalidState { state: self.state, operation: operation.to_string() }
    }
}
