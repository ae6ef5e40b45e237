//! Network edge of the Swapchat client.
//!
//! - [`BackendClient`]: REST calls against the backend (user lookup, chat
//!   list, login lifecycle) with a cookie jar holding the login token
//! - [`bearer_token`]: extraction of the login token from a cookie header
//! - [`ClientConfig`]: backend address, relay namespace and timeouts
//! - `SocketIoConnector` (feature `transport`): Socket.IO over WebSocket
//!   implementation of [`swapchat_core::RelayConnector`]

mod config;
mod cookie;
mod error;
mod rest;
#[cfg(feature = "transport")]
mod ws;

pub use config::{ClientConfig, DEFAULT_COOKIE_NAME};
pub use cookie::bearer_token;
pub use error::ClientError;
pub use rest::BackendClient;
#[cfg(feature = "transport")]
pub use ws::{SocketIoConnection, SocketIoConnector};
