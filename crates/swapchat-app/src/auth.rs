//! Authentication context.
//!
//! One [`AuthContext`] lives for the whole process. Its lifecycle is
//! explicit: [`AuthContext::initialize`] runs once at startup, after which
//! the state only changes through `refresh`, `login` and `logout`.
//!
//! ```text
//! Unknown ──initialize──> Authenticated(User) ──logout──> Anonymous
//!                    └──> Anonymous ──login──> Authenticated(User)
//! ```

use std::future::Future;

use swapchat_client::{BackendClient, ClientError};
use swapchat_proto::rest::{ApiMessage, User};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Backend calls needed by the auth context.
pub trait AuthBackend: Send + Sync {
    /// Current user from the login cookie.
    fn verify_user(&self) -> impl Future<Output = Result<User, ClientError>> + Send;

    /// Log in with email and password.
    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<User, ClientError>> + Send;

    /// Clear the login cookie.
    fn logout(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Create an account.
    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ApiMessage, ClientError>> + Send;

    /// Login token for the relay handshake, empty when logged out.
    fn bearer_token(&self) -> String;
}

impl AuthBackend for BackendClient {
    fn verify_user(&self) -> impl Future<Output = Result<User, ClientError>> + Send {
        BackendClient::verify_user(self)
    }

    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<User, ClientError>> + Send {
        BackendClient::login(self, email, password)
    }

    fn logout(&self) -> impl Future<Output = Result<(), ClientError>> + Send {
        BackendClient::logout(self)
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ApiMessage, ClientError>> + Send {
        BackendClient::register(self, username, email, password)
    }

    fn bearer_token(&self) -> String {
        BackendClient::bearer_token(self)
    }
}

/// Who is using the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Not checked yet
    Unknown,
    /// No valid login
    Anonymous,
    /// Logged in
    Authenticated(User),
}

impl AuthState {
    /// Logged-in user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Unknown | Self::Anonymous => None,
        }
    }
}

/// Errors from login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credentials were refused.
    #[error("{0}")]
    Rejected(String),

    /// Backend answered with a user record missing email or username.
    #[error("incomplete user record")]
    IncompleteUser,

    /// Backend unreachable or misbehaving.
    #[error(transparent)]
    Backend(#[from] ClientError),
}

/// Authentication state plus the backend that maintains it.
#[derive(Debug)]
pub struct AuthContext<B> {
    backend: B,
    state: AuthState,
    error: Option<String>,
}

impl<B: AuthBackend> AuthContext<B> {
    /// Context in `Unknown` state.
    pub fn new(backend: B) -> Self {
        Self { backend, state: AuthState::Unknown, error: None }
    }

    /// Current state.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Logged-in user, if any.
    pub fn user(&self) -> Option<&User> {
        self.state.user()
    }

    /// Whether a user is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// Message from the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Startup check of the login cookie.
    pub async fn initialize(&mut self) -> &AuthState {
        if self.state != AuthState::Unknown {
            debug!("auth context already initialized");
            return &self.state;
        }
        self.refresh().await
    }

    /// Re-check the login cookie.
    pub async fn refresh(&mut self) -> &AuthState {
        self.error = None;
        self.state = match self.backend.verify_user().await {
            Ok(user) if user.is_complete() => {
                info!(username = %user.username, "authenticated");
                AuthState::Authenticated(user)
            },
            Ok(_) => AuthState::Anonymous,
            Err(err) => {
                debug!(%err, "not authenticated");
                self.error = Some("Authentication failed".to_string());
                AuthState::Anonymous
            },
        };
        &self.state
    }

    /// Log in with email and password.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        match self.backend.login(email, password).await {
            Ok(user) if user.is_complete() => {
                self.error = None;
                info!(username = %user.username, "logged in");
                self.state = AuthState::Authenticated(user);
                self.user().ok_or(AuthError::IncompleteUser)
            },
            Ok(_) => {
                self.error = Some("Login failed".to_string());
                Err(AuthError::IncompleteUser)
            },
            Err(ClientError::Status { message, .. }) => {
                warn!(%message, "login rejected");
                self.error = Some(message.clone());
                Err(AuthError::Rejected(message))
            },
            Err(err) => {
                self.error = Some("Login failed".to_string());
                Err(AuthError::Backend(err))
            },
        }
    }

    /// Log out. Backend failures are logged; the local state is always
    /// cleared.
    pub async fn logout(&mut self) {
        if let Err(err) = self.backend.logout().await {
            warn!(%err, "logout request failed");
        }
        self.error = None;
        self.state = AuthState::Anonymous;
        info!("logged out");
    }

    /// Create an account. Does not log in.
    pub async fn register(&mut self, username: &str, email: &str, password: &str) -> Result<ApiMessage, AuthError> {
        self.error = None;
        match self.backend.register(username, email, password).await {
            Ok(ack) => Ok(ack),
            Err(ClientError::Status { message, .. }) => {
                self.error = Some(message.clone());
                Err(AuthError::Rejected(message))
            },
            Err(err) => {
                self.error = Some("Account creation failed".to_string());
                Err(AuthError::Backend(err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[derive(Debug, Default)]
    struct FakeBackend {
        session: Mutex<Option<User>>,
        logouts: AtomicUsize,
        logout_fails: bool,
    }

    fn ada() -> User {
        User { email: "ada@example.org".into(), username: "ada".into(), uuid: None }
    }

    fn unauthorized(message: &str) -> ClientError {
        ClientError::Status { status: 401, message: message.into() }
    }

    impl AuthBackend for FakeBackend {
        fn verify_user(&self) -> impl Future<Output = Result<User, ClientError>> + Send {
            let user = self.session.lock().unwrap().clone();
            std::future::ready(user.ok_or_else(|| unauthorized("Unauthorized")))
        }

        fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<User, ClientError>> + Send {
            let result = if email == "ada@example.org" && password == "pw" {
                *self.session.lock().unwrap() = Some(ada());
                Ok(ada())
            } else if email == "half@example.org" {
                Ok(User { email: email.into(), username: String::new(), uuid: None })
            } else {
                Err(unauthorized("Invalid email or password"))
            };
            std::future::ready(result)
        }

        fn logout(&self) -> impl Future<Output = Result<(), ClientError>> + Send {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            *self.session.lock().unwrap() = None;
            let result = if self.logout_fails { Err(ClientError::Http("offline".into())) } else { Ok(()) };
            std::future::ready(result)
        }

        fn register(
            &self,
            username: &str,
            _email: &str,
            _password: &str,
        ) -> impl Future<Output = Result<ApiMessage, ClientError>> + Send {
            let result = if username == "taken" {
                Err(ClientError::Status { status: 409, message: "Username already exists".into() })
            } else {
                Ok(ApiMessage { message: Some("Account created".into()) })
            };
            std::future::ready(result)
        }

        fn bearer_token(&self) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn initialize_without_cookie_is_anonymous() {
        let mut auth = AuthContext::new(FakeBackend::default());
        assert_eq!(auth.state(), &AuthState::Unknown);
        assert_eq!(auth.initialize().await, &AuthState::Anonymous);
        assert_eq!(auth.error(), Some("Authentication failed"));
    }

    #[tokio::test]
    async fn initialize_runs_once() {
        let backend = FakeBackend::default();
        *backend.session.lock().unwrap() = Some(ada());
        let mut auth = AuthContext::new(backend);
        auth.initialize().await;
        assert!(auth.is_authenticated());

        *auth.backend().session.lock().unwrap() = None;
        auth.initialize().await;
        assert!(auth.is_authenticated());
        auth.refresh().await;
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn login_rejection_keeps_backend_message() {
        let mut auth = AuthContext::new(FakeBackend::default());
        auth.initialize().await;

        let err = auth.login("ada@example.org", "wrong").await.unwrap_err();
        assert_eq!(err, AuthError::Rejected("Invalid email or password".into()));
        assert_eq!(auth.error(), Some("Invalid email or password"));

        let user = auth.login("ada@example.org", "pw").await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(auth.error(), None);
    }

    #[tokio::test]
    async fn incomplete_user_is_not_a_login() {
        let mut auth = AuthContext::new(FakeBackend::default());
        assert_eq!(auth.login("half@example.org", "pw").await.unwrap_err(), AuthError::IncompleteUser);
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_state_even_when_backend_fails() {
        let backend = FakeBackend { logout_fails: true, ..FakeBackend::default() };
        let mut auth = AuthContext::new(backend);
        auth.login("ada@example.org", "pw").await.unwrap();

        auth.logout().await;
        assert_eq!(auth.state(), &AuthState::Anonymous);
        assert_eq!(auth.backend().logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn register_does_not_log_in() {
        let mut auth = AuthContext::new(FakeBackend::default());
        auth.initialize().await;

        let ack = auth.register("ada", "ada@example.org", "pw").await.unwrap();
        assert_eq!(ack.message.as_deref(), Some("Account created"));
        assert!(!auth.is_authenticated());

        let err = auth.register("taken", "t@example.org", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");
    }
}
