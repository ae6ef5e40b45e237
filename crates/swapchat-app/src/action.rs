//! Application actions
//!
//! Actions produced by the App state machine and front-ends for the runtime
//! to execute.

use swapchat_proto::FileData;

use crate::selection::SessionSelection;

/// Actions for the runtime.
#[derive(Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Fetch the conversation list.
    LoadChats,

    /// Open a conversation, leaving the current one first.
    OpenSession(SessionSelection),

    /// Leave the current conversation.
    LeaveSession,

    /// Send a text message in the current conversation.
    SendText(String),

    /// Share a file in the current conversation.
    SendFile(FileData),

    /// Log in with email and password.
    Login {
        /// Login email
        email: String,
        /// Password
        password: String,
    },

    /// Create an account.
    Register {
        /// Public username
        username: String,
        /// Login email
        email: String,
        /// Password
        password: String,
    },

    /// Log out, leaving any open conversation.
    Logout,

    /// Re-check the login and reload the conversation list.
    Refresh,
}

impl std::fmt::Debug for AppAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render => f.write_str("Render"),
            Self::Quit => f.write_str("Quit"),
            Self::LoadChats => f.write_str("LoadChats"),
            Self::OpenSession(selection) => f.debug_tuple("OpenSession").field(selection).finish(),
            Self::LeaveSession => f.write_str("LeaveSession"),
            Self::SendText(text) => f.debug_tuple("SendText").field(&text.len()).finish(),
            Self::SendFile(file) => f.debug_tuple("SendFile").field(&file.name).finish(),
            Self::Login { email, .. } => {
                f.debug_struct("Login").field("email", email).field("password", &"<redacted>").finish()
            },
            Self::Register { username, email, .. } => f
                .debug_struct("Register")
                .field("username", username)
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Self::Logout => f.write_str("Logout"),
            Self::Refresh => f.write_str("Refresh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_credentials_and_message_text() {
        let login = AppAction::Login { email: "a@b.c".into(), password: "hunter2".into() };
        let rendered = format!("{login:?}");
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("hunter2"));

        let send = format!("{:?}", AppAction::SendText("secret plan".into()));
        assert!(!send.contains("secret"));
    }
}
