//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. The terminal front-end and the simulation harness each
//! implement it, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use swapchat_core::{RelayAuth, TransportError};
use swapchat_proto::{ClientEvent, RelayEvent};

use crate::{App, AppAction};

/// What the driver observed while waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// User input translated to actions
    Input(Vec<AppAction>),
    /// Event from the relay connection
    Relay(RelayEvent),
    /// Nothing happened within the driver's poll window
    Idle,
    /// Input source is gone; the runtime should quit
    Closed,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`crate::Runtime`] handles orchestration logic. This ensures the same
/// orchestration code runs in the terminal and in simulation.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for input or a relay event.
    ///
    /// Must be cancellation safe: the runtime races it against key
    /// generation.
    fn next_event(&mut self, app: &mut App) -> impl Future<Output = Result<DriverEvent, Self::Error>> + Send;

    /// Open the relay connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay is unreachable or refuses the handshake.
    fn connect(&mut self, auth: &RelayAuth) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send an event to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is open or the send fails.
    fn emit(&mut self, event: ClientEvent) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the relay connection, if open.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Check if a relay connection is open.
    fn is_connected(&self) -> bool;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Stop and clean up resources.
    fn stop(&mut self);
}
