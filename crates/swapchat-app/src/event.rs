//! Application events
//!
//! Results of runtime work fed back into the App state machine.

use swapchat_core::{CloseReason, Counterpart};
use swapchat_proto::rest::ChatSummary;

use crate::{auth::AuthState, state::SessionView};

/// Events for [`crate::App::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Login state changed.
    AuthChanged(AuthState),

    /// Conversation list arrived.
    ChatsLoaded(Vec<ChatSummary>),

    /// A conversation view was opened.
    SessionOpened(Counterpart),

    /// The open conversation changed.
    SessionUpdated(SessionView),

    /// The conversation view was closed.
    SessionClosed {
        /// Why, when the close was not requested by the user
        reason: Option<CloseReason>,
    },

    /// Status line message.
    Notice(String),
}
