//! Realtime events exchanged with the relay.
//!
//! Every event is a Socket.IO `EVENT` packet whose argument list holds a
//! single JSON value. Field names follow the relay's JavaScript conventions
//! (`publicKey`, `byMe`, `server_public_key`), so the payload structs rename
//! explicitly rather than relying on a blanket case conversion.
//!
//! # Protocol Flow
//!
//! ```text
//! client                                   relay
//!   │ join_conversation {to, publicKey}      │
//!   │───────────────────────────────────────>│
//!   │ previous_chats {to}                    │
//!   │───────────────────────────────────────>│
//!   │   previous_chats {chats, archived,     │
//!   │                   server_public_key}   │
//!   │<───────────────────────────────────────│
//!   │ message_sent {to, type, content}       │
//!   │───────────────────────────────────────>│
//!   │   message_received {.., byMe: true}    │
//!   │<───────────────────────────────────────│
//!   │ offline {to}                           │
//!   │───────────────────────────────────────>│
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    errors::{ProtocolError, Result},
    message::{MessageKind, WireMessage},
};

/// Socket.IO namespace served by the relay.
pub const NAMESPACE: &str = "/private_chat";

/// Event names on the wire.
pub mod names {
    /// Client announces itself and its public key for a conversation
    pub const JOIN_CONVERSATION: &str = "join_conversation";
    /// History request (client) and history snapshot (relay)
    pub const PREVIOUS_CHATS: &str = "previous_chats";
    /// Outgoing message
    pub const MESSAGE_SENT: &str = "message_sent";
    /// Presence update when leaving a conversation
    pub const OFFLINE: &str = "offline";
    /// Incoming message, including echoes of our own sends
    pub const MESSAGE_RECEIVED: &str = "message_received";
    /// Relay refuses a conversation with oneself
    pub const CANT_CONNECT_WITH_SELF: &str = "cantConnectWithSelf";
    /// Transport-level disconnect
    pub const DISCONNECT: &str = "disconnect";
}

/// File attachment sent with a `file` message.
///
/// The relay stores the bytes and replies with a URL in the echoed message.
#[derive(Clone, PartialEq, Eq)]
pub struct FileData {
    /// Original file name
    pub name: String,
    /// Raw file contents
    pub buffer: Vec<u8>,
    /// MIME type reported by the sender
    pub mime: String,
}

impl std::fmt::Debug for FileData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileData")
            .field("name", &self.name)
            .field("len", &self.buffer.len())
            .field("mime", &self.mime)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct FileDataWire {
    name: String,
    buffer: String,
    mime: String,
}

impl From<&FileData> for FileDataWire {
    fn from(file: &FileData) -> Self {
        Self { name: file.name.clone(), buffer: STANDARD.encode(&file.buffer), mime: file.mime.clone() }
    }
}

/// Body of an outgoing `message_sent` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingContent {
    /// Base64 RSA-OAEP ciphertext of the message text
    Text {
        /// Ciphertext for the relay's public key
        ciphertext: String,
    },
    /// Unencrypted file upload
    File(FileData),
}

impl OutgoingContent {
    /// Message kind advertised in the `type` field.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::File(_) => MessageKind::File,
        }
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Enter a conversation and hand the relay our public key
    JoinConversation {
        /// Counterpart identifier
        to: String,
        /// PEM-encoded RSA public key
        public_key: String,
    },

    /// Ask for the conversation history
    PreviousChats {
        /// Counterpart identifier
        to: String,
    },

    /// Send a message
    MessageSent {
        /// Counterpart identifier
        to: String,
        /// Encrypted text or file upload
        content: OutgoingContent,
    },

    /// Leave the conversation view
    Offline {
        /// Counterpart identifier
        to: String,
    },
}

#[derive(Deserialize)]
struct ToArgs {
    to: String,
}

#[derive(Deserialize)]
struct JoinArgs {
    to: String,
    #[serde(rename = "publicKey")]
    public_key: String,
}

#[derive(Deserialize)]
struct SentArgs {
    to: String,
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    filedata: Option<FileDataWire>,
}

impl ClientEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => names::JOIN_CONVERSATION,
            Self::PreviousChats { .. } => names::PREVIOUS_CHATS,
            Self::MessageSent { .. } => names::MESSAGE_SENT,
            Self::Offline { .. } => names::OFFLINE,
        }
    }

    /// Counterpart the event is addressed to.
    pub fn to(&self) -> &str {
        match self {
            Self::JoinConversation { to, .. }
            | Self::PreviousChats { to }
            | Self::MessageSent { to, .. }
            | Self::Offline { to } => to,
        }
    }

    /// JSON argument carried by the event.
    pub fn to_args(&self) -> Value {
        match self {
            Self::JoinConversation { to, public_key } => json!({ "to": to, "publicKey": public_key }),
            Self::PreviousChats { to } | Self::Offline { to } => json!({ "to": to }),
            Self::MessageSent { to, content: OutgoingContent::Text { ciphertext } } => {
                json!({ "to": to, "type": MessageKind::Text, "content": ciphertext })
            },
            Self::MessageSent { to, content: OutgoingContent::File(file) } => {
                let wire = FileDataWire::from(file);
                json!({
                    "to": to,
                    "type": MessageKind::File,
                    "filedata": { "name": wire.name, "buffer": wire.buffer, "mime": wire.mime },
                })
            },
        }
    }

    /// Decode an event received from a client.
    ///
    /// The relay side of the protocol; used by simulation and fuzzing.
    pub fn decode(name: &str, args: Option<Value>) -> Result<Self> {
        let args = args.unwrap_or(Value::Null);
        let invalid = |err: serde_json::Error| ProtocolError::InvalidEventArgs {
            event: name.to_string(),
            reason: err.to_string(),
        };

        match name {
            names::JOIN_CONVERSATION => {
                let JoinArgs { to, public_key } = serde_json::from_value(args).map_err(invalid)?;
                Ok(Self::JoinConversation { to, public_key })
            },
            names::PREVIOUS_CHATS => {
                let ToArgs { to } = serde_json::from_value(args).map_err(invalid)?;
                Ok(Self::PreviousChats { to })
            },
            names::OFFLINE => {
                let ToArgs { to } = serde_json::from_value(args).map_err(invalid)?;
                Ok(Self::Offline { to })
            },
            names::MESSAGE_SENT => {
                let sent: SentArgs = serde_json::from_value(args).map_err(invalid)?;
                let content = match (sent.kind, sent.content, sent.filedata) {
                    (MessageKind::Text, Some(ciphertext), _) => OutgoingContent::Text { ciphertext },
                    (MessageKind::File, _, Some(file)) => {
                        let buffer = STANDARD.decode(file.buffer.as_bytes()).map_err(|err| {
                            ProtocolError::InvalidEventArgs {
                                event: name.to_string(),
                                reason: format!("filedata.buffer: {err}"),
                            }
                        })?;
                        OutgoingContent::File(FileData { name: file.name, buffer, mime: file.mime })
                    },
                    (kind, ..) => {
                        return Err(ProtocolError::InvalidEventArgs {
                            event: name.to_string(),
                            reason: format!("missing body for {kind:?} message"),
                        });
                    },
                };
                Ok(Self::MessageSent { to: sent.to, content })
            },
            other => Err(ProtocolError::Malformed(format!("unknown client event {other:?}"))),
        }
    }
}

/// History snapshot returned after `previous_chats`.
///
/// Entries are decoded one at a time: a broken entry becomes
/// [`WireMessage::unreadable`] at its index instead of failing the batch.
/// `null` or missing `chats` and `archived` mean empty and `false`. Only a
/// missing relay key makes the snapshot itself undecodable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SnapshotWire")]
pub struct HistorySnapshot {
    /// Messages in relay order
    pub chats: Vec<WireMessage>,

    /// Older messages were archived by the relay
    pub archived: bool,

    /// Relay's PEM-encoded public key for this session
    pub server_public_key: String,
}

#[derive(Deserialize)]
struct SnapshotWire {
    #[serde(default)]
    chats: Option<Value>,
    #[serde(default)]
    archived: Option<Value>,
    server_public_key: String,
}

impl From<SnapshotWire> for HistorySnapshot {
    fn from(wire: SnapshotWire) -> Self {
        let chats = match wire.chats {
            Some(Value::Array(entries)) => entries.into_iter().map(WireMessage::from_value_lossy).collect(),
            _ => Vec::new(),
        };
        Self {
            chats,
            archived: matches!(wire.archived, Some(Value::Bool(true))),
            server_public_key: wire.server_public_key,
        }
    }
}

/// Events delivered by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Conversation history plus the relay key
    PreviousChats(HistorySnapshot),

    /// A new message, possibly the echo of our own send
    MessageReceived(WireMessage),

    /// Counterpart resolves to the caller
    CantConnectWithSelf,

    /// Transport closed
    Disconnect {
        /// Human-readable cause
        reason: String,
    },

    /// Event this client does not handle
    Unknown {
        /// Event name as received
        name: String,
    },

    /// Known event whose payload could not be decoded
    Malformed {
        /// Event name as received
        name: String,
        /// Decoder error
        reason: String,
    },
}

impl RelayEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &str {
        match self {
            Self::PreviousChats(_) => names::PREVIOUS_CHATS,
            Self::MessageReceived(_) => names::MESSAGE_RECEIVED,
            Self::CantConnectWithSelf => names::CANT_CONNECT_WITH_SELF,
            Self::Disconnect { .. } => names::DISCONNECT,
            Self::Unknown { name } | Self::Malformed { name, .. } => name,
        }
    }

    /// Decode an event, turning a payload that does not decode into
    /// [`RelayEvent::Malformed`] so the session can react to it.
    pub fn decode_lossy(name: &str, args: Option<Value>) -> Self {
        Self::decode(name, args)
            .unwrap_or_else(|err| Self::Malformed { name: name.to_string(), reason: err.to_string() })
    }

    /// Decode an event from its name and first argument.
    pub fn decode(name: &str, args: Option<Value>) -> Result<Self> {
        let invalid = |err: serde_json::Error| ProtocolError::InvalidEventArgs {
            event: name.to_string(),
            reason: err.to_string(),
        };

        match name {
            names::PREVIOUS_CHATS => {
                let snapshot = serde_json::from_value(args.unwrap_or(Value::Null)).map_err(invalid)?;
                Ok(Self::PreviousChats(snapshot))
            },
            names::MESSAGE_RECEIVED => Ok(Self::MessageReceived(WireMessage::from_value_lossy(
                args.unwrap_or(Value::Null),
            ))),
            names::CANT_CONNECT_WITH_SELF => Ok(Self::CantConnectWithSelf),
            names::DISCONNECT => {
                let reason = args
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or("relay disconnected")
                    .to_string();
                Ok(Self::Disconnect { reason })
            },
            other => Ok(Self::Unknown { name: other.to_string() }),
        }
    }

    /// JSON argument carried by the event, if any.
    pub fn to_args(&self) -> Result<Option<Value>> {
        Ok(match self {
            Self::PreviousChats(snapshot) => Some(serde_json::to_value(snapshot)?),
            Self::MessageReceived(message) => Some(serde_json::to_value(message)?),
            Self::Disconnect { reason } => Some(Value::String(reason.clone())),
            Self::CantConnectWithSelf | Self::Unknown { .. } | Self::Malformed { .. } => None,
        })
    }
}
