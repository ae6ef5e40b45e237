use std::time::Duration;

use swapchat_proto::NAMESPACE;
use url::Url;

use crate::error::ClientError;

/// Name of the cookie that carries the login JWT.
pub const DEFAULT_COOKIE_NAME: &str = "SubjectSwapLoginJWT";

/// Backend and relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST backend base URL; the relay is served from the same origin
    pub backend_url: Url,
    /// Socket.IO namespace of the chat relay
    pub namespace: String,
    /// Cookie holding the bearer token
    pub cookie_name: String,
    /// Per-request timeout for REST calls
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Defaults for everything except the backend address.
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            namespace: NAMESPACE.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Parse the backend URL and apply defaults.
    pub fn parse(backend_url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(backend_url).map_err(|e| ClientError::Config(format!("{backend_url}: {e}")))?;
        Ok(Self::new(url))
    }

    /// Absolute URL for a REST path such as `/chat/previous_chats`.
    ///
    /// Paths are appended to the base so a backend mounted under a prefix
    /// keeps its prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.backend_url.as_str().trim_end_matches('/');
        let joined = format!("{base}/{}", path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ClientError::Config(format!("{joined}: {e}")))
    }

    /// WebSocket URL of the Engine.IO endpoint.
    pub fn relay_url(&self) -> Result<Url, ClientError> {
        let mut url = self.endpoint("/socket.io/")?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::Config(format!("unsupported scheme {other}"))),
        };
        url.set_scheme(scheme).map_err(|()| ClientError::Config(format!("cannot use scheme {scheme}")))?;
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}
