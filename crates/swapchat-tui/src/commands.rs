//! Command parsing for the terminal client.
//!
//! This module parses input lines into structured [`Command`] values.

/// What `/open` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    /// 1-based position in the conversation list.
    Index(usize),
    /// Counterpart id, as in a direct link.
    Uuid(String),
}

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a message in the open conversation.
    Message {
        /// Message text.
        content: String,
    },

    /// Share a file in the open conversation.
    SendFile {
        /// File name shown to the counterpart.
        name: String,
        /// MIME type.
        mime: String,
        /// Local path to read.
        path: String,
    },

    /// Open a conversation.
    Open {
        /// List position or counterpart id.
        target: OpenTarget,
    },

    /// Leave the open conversation.
    Back,

    /// Re-check the login and reload the conversation list.
    Refresh,

    /// Log in.
    Login {
        /// Login email.
        email: String,
        /// Password.
        password: String,
    },

    /// Create an account.
    Register {
        /// Public username.
        username: String,
        /// Login email.
        email: String,
        /// Password.
        password: String,
    },

    /// Log out.
    Logout,

    /// Quit the application.
    Quit,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

fn usage(command: &str, usage: &str) -> Command {
    Command::InvalidArgs { command: command.into(), error: format!("Usage: {usage}") }
}

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "file" => match parts.as_slice() {
            [_, name, mime, path @ ..] if !path.is_empty() => Command::SendFile {
                name: (*name).to_string(),
                mime: (*mime).to_string(),
                path: path.join(" "),
            },
            _ => usage("file", "/file <name> <mime> <path>"),
        },

        "open" => match parts.get(1) {
            Some(arg) => match arg.parse::<usize>() {
                Ok(0) => Command::InvalidArgs { command: "open".into(), error: "Positions start at 1".into() },
                Ok(index) => Command::Open { target: OpenTarget::Index(index) },
                Err(_) => Command::Open { target: OpenTarget::Uuid((*arg).to_string()) },
            },
            None => usage("open", "/open <number|uuid>"),
        },

        "back" | "leave" => Command::Back,

        "refresh" => Command::Refresh,

        "login" => match parts.as_slice() {
            [_, email, password] => Command::Login { email: (*email).to_string(), password: (*password).to_string() },
            _ => usage("login", "/login <email> <password>"),
        },

        "register" => match parts.as_slice() {
            [_, username, email, password] => Command::Register {
                username: (*username).to_string(),
                email: (*email).to_string(),
                password: (*password).to_string(),
            },
            _ => usage("register", "/register <username> <email> <password>"),
        },

        "logout" => Command::Logout,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
