//! REST backend request and response bodies.
//!
//! All endpoints are `POST` with JSON bodies and cookie authentication.

use serde::{Deserialize, Serialize};

/// Endpoint paths relative to the backend base URL.
pub mod paths {
    /// Resolve a counterpart id to display metadata
    pub const USER_INFO: &str = "/chat/get_user_info";
    /// Conversations the current user has taken part in
    pub const PREVIOUS_CHATS: &str = "/chat/previous_chats";
    /// Current user from the login cookie
    pub const VERIFY_USER: &str = "/verify-user";
    /// Email and password login, sets the login cookie
    pub const LOGIN: &str = "/login";
    /// Clear the login cookie
    pub const LOGOUT: &str = "/logout";
    /// Account registration
    pub const CREATE_ACCOUNT: &str = "/create-account";
}

/// Body of `get_user_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoRequest {
    /// Counterpart id
    pub uuid: String,
}

/// Counterpart display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Display name
    pub name: String,
    /// Avatar URL, if the user uploaded one
    #[serde(rename = "profilePic", default)]
    pub profile_pic: Option<String>,
}

/// One entry of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Counterpart id, used as `to` in relay events
    pub convo_id: String,
    /// Counterpart display name
    pub name: String,
    /// Counterpart avatar URL
    #[serde(rename = "profilePic", default)]
    pub profile_pic: Option<String>,
}

/// Authenticated user as reported by `verify-user` and `login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Public username
    #[serde(default)]
    pub username: String,
    /// Stable user id, when the backend includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl User {
    /// A user record is only usable with both email and username present.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.username.is_empty()
    }
}

/// Body of `login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login email
    pub email: String,
    /// Plaintext password, sent over TLS only
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest").field("email", &self.email).finish_non_exhaustive()
    }
}

/// Body of `create-account`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Public username
    pub username: String,
    /// Login email
    pub email: String,
    /// Plaintext password, sent over TLS only
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Generic `{message}` body used for errors and acknowledgements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Fallback avatar service used when a user has no profile picture.
pub const AVATAR_FALLBACK: &str = "https://ui-avatars.com/api/?name=";

/// Avatar URL for a user, falling back to a generated initials image.
pub fn avatar_url(name: &str, profile_pic: Option<&str>) -> String {
    match profile_pic {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("{AVATAR_FALLBACK}{}", encode_uri_component(name)),
    }
}

/// Percent-encode everything except the URI unreserved and mark characters.
fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(char::from(byte)),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
