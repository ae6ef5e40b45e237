//! Swapchat session core
//!
//! Pure state machine logic for one encrypted conversation, decoupled from
//! I/O. Key generation, transport and rendering are all driven from outside.
//!
//! # Architecture
//!
//! A [`Session`] consumes [`SessionEvent`]s (transport connected, key pair
//! ready, relay event, user send, teardown) and returns declarative
//! [`SessionAction`]s (emit this event, render, navigate away, deregister
//! listeners). A runtime interprets the actions. The same machine therefore
//! runs under the terminal front-end and under the simulation harness.
//!
//! Randomness comes from an [`Environment`], so seeded simulations produce
//! identical ciphertext across runs.
//!
//! # Components
//!
//! - [`session`]: Session state machine and pending-send guard
//! - [`history`]: Per-message decryption with placeholder isolation
//! - [`gate`]: Buffer for messages that race ahead of the history snapshot
//! - [`mod@env`]: Environment abstraction (RNG, sleep)
//! - [`transport`]: Relay connection abstraction
//! - [`error`]: Session and transport error types

pub mod env;
pub mod error;
pub mod gate;
pub mod history;
pub mod session;
pub mod transport;

pub use env::{Environment, SystemEnv};
pub use error::{SendRejection, SessionError, TransportError};
pub use history::{Body, ChatMessage, PLACEHOLDER_TEXT, Plaintext, open_history, open_message};
pub use session::{
    CloseReason, Counterpart, OutgoingMessage, Session, SessionAction, SessionConfig, SessionEvent, SessionState,
};
pub use transport::{RelayAuth, RelayConnection, RelayConnector};
