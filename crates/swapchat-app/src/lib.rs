//! Application layer for Swapchat
//!
//! Pure state machines and a generic runtime for UI and session
//! orchestration, so simulation tests drive the same code that runs in the
//! terminal.
//!
//! # Components
//!
//! - [`App`]: Application state (login, conversation list, open conversation)
//! - [`AuthContext`]: Explicit authentication lifecycle over the backend
//! - [`Bridge`]: Session bridge (translates App actions to session events)
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver

mod action;
mod app;
pub mod auth;
mod bridge;
mod driver;
mod event;
mod runtime;
pub mod selection;
pub mod state;

pub use action::AppAction;
pub use app::{App, Screen};
pub use auth::{AuthBackend, AuthContext, AuthError, AuthState};
pub use bridge::Bridge;
pub use driver::{Driver, DriverEvent};
pub use event::AppEvent;
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};
pub use selection::{Directory, SessionSelection};
pub use state::{DateGroup, MessageBody, MessageView, SessionView};
