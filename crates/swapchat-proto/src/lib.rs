//! Wire format for the Swapchat relay and REST backend.
//!
//! The realtime relay speaks Socket.IO v5 over Engine.IO v4 WebSocket text
//! frames. Every packet is a short type prefix followed by an optional
//! namespace, an optional ack id and a JSON body. Events carry a name plus a
//! single JSON argument, which this crate maps to typed [`ClientEvent`] and
//! [`RelayEvent`] values.
//!
//! The REST backend is plain JSON over HTTP; its request and response bodies
//! live in [`rest`].
//!
//! # Security
//!
//! Text message content is RSA-OAEP ciphertext in transit. This crate never
//! sees plaintext for text messages: encryption and decryption happen in
//! `swapchat-crypto`. File messages carry an unencrypted URL.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod events;
pub mod message;
pub mod packet;
pub mod rest;

pub use errors::{ProtocolError, Result};
pub use events::{ClientEvent, FileData, HistorySnapshot, NAMESPACE, OutgoingContent, RelayEvent};
pub use message::{MessageKind, Timestamp, WireMessage};
pub use packet::{EnginePacket, OpenHandshake, SocketPacket};
