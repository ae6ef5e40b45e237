//! REST backend client.
//!
//! Every endpoint is a JSON `POST` authenticated by the login cookie. The
//! client keeps its own cookie jar, so a successful `login` makes the token
//! available to [`BackendClient::bearer_token`] for the relay handshake.

use std::sync::Arc;

use reqwest::{
    Response,
    cookie::{CookieStore, Jar},
};
use serde::{Serialize, de::DeserializeOwned};
use swapchat_core::RelayAuth;
use swapchat_proto::rest::{
    ApiMessage, ChatSummary, LoginRequest, RegisterRequest, User, UserInfo, UserInfoRequest, paths,
};
use tracing::{debug, warn};

use crate::{config::ClientConfig, cookie::bearer_token, error::ClientError};

/// HTTP client for the Swapchat backend.
#[derive(Clone)]
pub struct BackendClient {
    config: ClientConfig,
    http: reqwest::Client,
    jar: Arc<Jar>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient").field("backend_url", &self.config.backend_url.as_str()).finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Build a client with an empty cookie jar.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http, jar })
    }

    /// Seed the jar from a `Cookie` header string (`a=1; b=2`).
    #[must_use]
    pub fn with_cookie(self, cookie_header: &str) -> Self {
        for pair in cookie_header.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            self.jar.add_cookie_str(pair, &self.config.backend_url);
        }
        self
    }

    /// Seed the jar with a bare login token.
    #[must_use]
    pub fn with_token(self, token: &str) -> Self {
        let cookie = format!("{}={token}", self.config.cookie_name);
        self.with_cookie(&cookie)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Login token from the jar, empty when not logged in.
    pub fn bearer_token(&self) -> String {
        self.jar
            .cookies(&self.config.backend_url)
            .and_then(|header| header.to_str().ok().map(|h| bearer_token(h, &self.config.cookie_name)))
            .unwrap_or_default()
    }

    /// Relay address and credentials for the current login.
    pub fn relay_auth(&self) -> Result<RelayAuth, ClientError> {
        Ok(RelayAuth {
            url: self.config.relay_url()?.to_string(),
            namespace: self.config.namespace.clone(),
            token: self.bearer_token(),
        })
    }

    /// Display metadata for a counterpart id.
    pub async fn user_info(&self, uuid: &str) -> Result<UserInfo, ClientError> {
        let body = UserInfoRequest { uuid: uuid.to_string() };
        decode(self.post(paths::USER_INFO, Some(&body)).await?).await
    }

    /// Conversations the current user has taken part in.
    pub async fn previous_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        decode(self.post::<()>(paths::PREVIOUS_CHATS, None).await?).await
    }

    /// Current user from the login cookie.
    pub async fn verify_user(&self) -> Result<User, ClientError> {
        decode(self.post::<()>(paths::VERIFY_USER, None).await?).await
    }

    /// Log in; the backend sets the login cookie on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        decode(self.post(paths::LOGIN, Some(&body)).await?).await
    }

    /// Clear the login cookie on the backend.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.post::<()>(paths::LOGOUT, None).await?;
        Ok(())
    }

    /// Create an account. The backend answers with a confirmation message.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<ApiMessage, ClientError> {
        let body =
            RegisterRequest { username: username.to_string(), email: email.to_string(), password: password.to_string() };
        decode(self.post(paths::CREATE_ACCOUNT, Some(&body)).await?).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<Response, ClientError> {
        let url = self.config.endpoint(path)?;
        debug!(%path, "backend request");

        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ApiMessage>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!(%path, status = status.as_u16(), %message, "backend request failed");
        Err(ClientError::Status { status: status.as_u16(), message })
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, ClientError> {
    response.json::<R>().await.map_err(|e| ClientError::Decode(e.to_string()))
}
