//! Render-ready view of a conversation.
//!
//! Front-ends never touch the session directly. After every session change
//! the runtime rebuilds a [`SessionView`] and hands it to the [`crate::App`].

use std::fmt::Display;

use chrono::{Local, TimeZone};
use swapchat_core::{Body, ChatMessage, Counterpart, Session, SessionState, env::Environment};
use swapchat_proto::rest::avatar_url;

/// Shown instead of a deleted message.
pub const DELETED_TEXT: &str = "This message is deleted";

/// Banner shown when the relay archived older messages.
pub const ARCHIVED_BANNER: &str = "Previous Conversations have been archived.";

/// Date label for timestamps that cannot be parsed.
const UNKNOWN_DATE: &str = "Unknown date";

/// How a message body should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Decrypted text
    Text(String),
    /// Decryption failed; the text is the placeholder
    Placeholder(String),
    /// Shared file with its download URL
    File {
        /// Download URL
        url: String,
        /// Human-readable description
        label: String,
    },
    /// Removed by its author
    Deleted,
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Presented body
    pub body: MessageBody,
    /// `HH:MM`, empty when unknown
    pub time: String,
    /// Sent by this user
    pub by_me: bool,
}

impl MessageView {
    /// Text to display for the body.
    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::Text(text) | MessageBody::Placeholder(text) => text,
            MessageBody::File { label, .. } => label,
            MessageBody::Deleted => DELETED_TEXT,
        }
    }
}

/// Messages sharing one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Messages in display order
    pub messages: Vec<MessageView>,
}

/// Snapshot of a conversation for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Other participant
    pub counterpart: Counterpart,
    /// Avatar URL, falling back to generated initials
    pub avatar: String,
    /// Session lifecycle state
    pub state: SessionState,
    /// Older messages were archived
    pub archived: bool,
    /// A send awaits its echo
    pub pending: bool,
    /// Disconnected notice, once the session ended
    pub notice: Option<String>,
    /// Messages grouped under date banners
    pub groups: Vec<DateGroup>,
}

impl SessionView {
    /// View of a session that has not received anything yet.
    pub fn connecting(counterpart: Counterpart) -> Self {
        let avatar = avatar_url(&counterpart.name, counterpart.profile_pic.as_deref());
        Self {
            counterpart,
            avatar,
            state: SessionState::Connecting,
            archived: false,
            pending: false,
            notice: None,
            groups: Vec::new(),
        }
    }

    /// Build the view from the session.
    pub fn from_session<E: Environment>(session: &Session<E>) -> Self {
        let mut view = Self::connecting(session.counterpart().clone());
        view.state = session.state();
        view.archived = session.is_archived();
        view.pending = session.is_send_pending();
        view.notice = session.close_reason().map(ToString::to_string);
        view.groups = group_by_date(session.messages());
        view
    }

    /// Whether the composer accepts input.
    pub fn can_send(&self) -> bool {
        self.state == SessionState::Active && !self.pending
    }

    /// Number of messages across all groups.
    pub fn message_count(&self) -> usize {
        self.groups.iter().map(|g| g.messages.len()).sum()
    }

    /// Archived banner, if any.
    pub fn banner(&self) -> Option<&'static str> {
        self.archived.then_some(ARCHIVED_BANNER)
    }
}

/// Group consecutive messages by local date. A date that reappears after
/// another date starts a new group, as the banner is shown on every change.
pub fn group_by_date(messages: &[ChatMessage]) -> Vec<DateGroup> {
    group_by_date_in(messages, &Local)
}

/// [`group_by_date`] with dates and times in `tz`.
pub fn group_by_date_in<Tz: TimeZone>(messages: &[ChatMessage], tz: &Tz) -> Vec<DateGroup>
where
    Tz::Offset: Display,
{
    let mut groups: Vec<DateGroup> = Vec::new();
    for message in messages {
        let date = message.timestamp.date_label_in(tz).unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let view = message_view(message, tz);
        match groups.last_mut() {
            Some(group) if group.date == date => group.messages.push(view),
            _ => groups.push(DateGroup { date, messages: vec![view] }),
        }
    }
    groups
}

fn message_view<Tz: TimeZone>(message: &ChatMessage, tz: &Tz) -> MessageView
where
    Tz::Offset: Display,
{
    let body = match &message.body {
        Body::Text(plaintext) if plaintext.is_placeholder() => MessageBody::Placeholder(plaintext.as_str().to_string()),
        Body::Text(plaintext) => MessageBody::Text(plaintext.as_str().to_string()),
        Body::File { url } => MessageBody::File { url: url.clone(), label: file_label(url) },
        Body::Deleted => MessageBody::Deleted,
    };
    MessageView { body, time: message.timestamp.time_label_in(tz).unwrap_or_default(), by_me: message.by_me }
}

/// `A certain .pdf file shared` for `https://cdn/x/notes.pdf?sig=1`.
pub fn file_label(url: &str) -> String {
    let last = url.rsplit('.').next().unwrap_or(url);
    let extension = last.split(['#', '?']).next().unwrap_or(last);
    format!("A certain .{extension} file shared")
}
