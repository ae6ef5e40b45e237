//! Terminal UI for Swapchat
//!
//! A thin shell over [`swapchat_app::Driver`] that provides terminal-specific
//! I/O. All orchestration logic lives in the generic [`swapchat_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod input;
pub mod terminal;
pub mod ui;

pub use commands::{Command, OpenTarget};
pub use input::{InputState, KeyInput};
pub use swapchat_app::{App, AppAction, AppEvent, Bridge, Driver, Runtime};
pub use terminal::{TerminalDriver, TerminalError, actions_for};
