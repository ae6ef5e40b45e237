//! Per-message decryption.
//!
//! Each message is decrypted on its own. A failure produces a placeholder
//! for that message only; the rest of the history is unaffected.

use swapchat_crypto::KeyPair;
use swapchat_proto::{MessageKind, Timestamp, WireMessage};
use tracing::warn;

/// Text shown in place of a message that could not be decrypted.
pub const PLACEHOLDER_TEXT: &str = "[Unable to decrypt message]";

/// Outcome of decrypting one text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plaintext {
    /// Decrypted text
    Decrypted(String),
    /// Ciphertext was corrupt or addressed to another key
    Placeholder,
}

impl Plaintext {
    /// Text to display.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Decrypted(text) => text,
            Self::Placeholder => PLACEHOLDER_TEXT,
        }
    }

    /// Whether decryption failed.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }
}

/// Message body after local processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Text message
    Text(Plaintext),
    /// File reference stored by the relay
    File {
        /// Download URL
        url: String,
    },
    /// Message removed by its author
    Deleted,
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Decrypted body
    pub body: Body,
    /// Relay timestamp
    pub timestamp: Timestamp,
    /// Sent by this user (relay-confirmed)
    pub by_me: bool,
}

impl ChatMessage {
    /// Whether this message shows the decryption placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(&self.body, Body::Text(plaintext) if plaintext.is_placeholder())
    }
}

/// Decrypt one message from the relay.
///
/// Never fails. Deleted and file messages pass through without touching the
/// key pair.
pub fn open_message(keys: &KeyPair, message: WireMessage) -> ChatMessage {
    let WireMessage { kind, content, timestamp, by_me, deleted } = message;

    let body = match (deleted, kind) {
        (true, _) => Body::Deleted,
        (false, MessageKind::File) => Body::File { url: content },
        (false, MessageKind::Text) => match keys.decrypt(&content) {
            Ok(text) => Body::Text(Plaintext::Decrypted(text)),
            Err(err) => {
                warn!(%err, by_me, "substituting placeholder for undecryptable message");
                Body::Text(Plaintext::Placeholder)
            },
        },
    };

    ChatMessage { body, timestamp, by_me }
}

/// Decrypt a history snapshot, preserving length and order.
pub fn open_history(keys: &KeyPair, chats: Vec<WireMessage>) -> Vec<ChatMessage> {
    chats.into_iter().map(|message| open_message(keys, message)).collect()
}
