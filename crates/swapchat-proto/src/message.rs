//! Chat message as carried by the relay.

use std::fmt::Display;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Text body, RSA-OAEP ciphertext in transit
    Text,
    /// File reference, `content` is an unencrypted URL
    File,
}

/// Message timestamp.
///
/// The relay sends either epoch milliseconds or an ISO-8601 string. Both
/// forms are kept verbatim so re-serialization is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch
    Millis(i64),
    /// ISO-8601 date-time string
    Text(String),
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::Millis(0)
    }
}

impl Timestamp {
    /// The instant this timestamp denotes.
    ///
    /// Text accepts RFC 3339, and date-times without an offset are read as
    /// UTC. Returns `None` for anything else.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Text(text) => {
                let text = text.trim();
                if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                    return Some(parsed.with_timezone(&Utc));
                }
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .or_else(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            },
        }
    }

    /// Calendar date as `YYYY-MM-DD` in `tz`.
    pub fn date_label_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<String>
    where
        Tz::Offset: Display,
    {
        self.to_datetime().map(|at| at.with_timezone(tz).format("%Y-%m-%d").to_string())
    }

    /// Wall-clock time as `HH:MM` in `tz`.
    pub fn time_label_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<String>
    where
        Tz::Offset: Display,
    {
        self.to_datetime().map(|at| at.with_timezone(tz).format("%H:%M").to_string())
    }

    /// Calendar date in the local time zone.
    pub fn date_label(&self) -> Option<String> {
        self.date_label_in(&Local)
    }

    /// Wall-clock time in the local time zone.
    pub fn time_label(&self) -> Option<String> {
        self.time_label_in(&Local)
    }
}

/// A message as delivered by the relay, before local decryption.
///
/// Decoding is lenient: `null` counts as absent for every field, and an
/// unrecognized `type` decodes as text so the slot still renders as an
/// unreadable message instead of failing the surrounding batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LenientMessage")]
pub struct WireMessage {
    /// Text or file
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Base64 ciphertext for text, URL for files
    pub content: String,

    /// When the relay accepted the message
    pub timestamp: Timestamp,

    /// True when the current user authored the message
    #[serde(rename = "byMe")]
    pub by_me: bool,

    /// Deleted messages keep their slot but carry no readable content
    pub deleted: bool,
}

impl WireMessage {
    /// Stand-in for an entry that could not be decoded at all.
    ///
    /// Empty ciphertext never decrypts, so the slot shows the unreadable
    /// placeholder. The timestamp is unparseable on purpose.
    pub fn unreadable(by_me: bool) -> Self {
        Self {
            kind: MessageKind::Text,
            content: String::new(),
            timestamp: Timestamp::Text(String::new()),
            by_me,
            deleted: false,
        }
    }

    /// Decode one relay entry, falling back to [`WireMessage::unreadable`].
    ///
    /// `byMe` is still honored when the rest of the entry is broken, so the
    /// echo of a send always clears the pending state.
    pub fn from_value_lossy(value: Value) -> Self {
        let by_me = value.get("byMe").and_then(Value::as_bool).unwrap_or(false);
        serde_json::from_value(value).unwrap_or_else(|_| Self::unreadable(by_me))
    }
}

#[derive(Deserialize)]
struct LenientMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    timestamp: Option<Timestamp>,
    #[serde(rename = "byMe", default)]
    by_me: Option<bool>,
    #[serde(default)]
    deleted: Option<bool>,
}

impl From<LenientMessage> for WireMessage {
    fn from(raw: LenientMessage) -> Self {
        let kind = match raw.kind.as_deref() {
            Some("file") => MessageKind::File,
            _ => MessageKind::Text,
        };
        Self {
            kind,
            content: raw.content.unwrap_or_default(),
            timestamp: raw.timestamp.unwrap_or_else(|| Timestamp::Text(String::new())),
            by_me: raw.by_me.unwrap_or(false),
            deleted: raw.deleted.unwrap_or(false),
        }
    }
}
