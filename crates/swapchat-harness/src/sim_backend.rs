//! In-memory backend for simulation.
//!
//! Implements the application's [`AuthBackend`] and [`Directory`] seams with
//! a handful of accounts. The login cookie is modeled as the token of the
//! currently logged-in account.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use swapchat_app::{AuthBackend, Directory};
use swapchat_client::ClientError;
use swapchat_proto::rest::{ApiMessage, ChatSummary, User, UserInfo};

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
    token: String,
    profile_pic: Option<String>,
}

#[derive(Debug, Default)]
struct BackendState {
    accounts: HashMap<String, Account>,
    current: Option<String>,
    chats: HashMap<String, Vec<ChatSummary>>,
    logouts: usize,
}

impl BackendState {
    fn current(&self) -> Option<&Account> {
        self.current.as_ref().and_then(|uuid| self.accounts.get(uuid))
    }
}

fn unauthorized() -> ClientError {
    ClientError::Status { status: 401, message: "Unauthorized".to_string() }
}

/// In-memory backend shared between the runtime and the test.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    state: Arc<Mutex<BackendState>>,
}

impl SimBackend {
    /// Backend with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an account. `uuid` doubles as the relay-side user id.
    pub fn add_account(&self, uuid: &str, username: &str, email: &str, password: &str, token: &str) {
        let user = User { email: email.to_string(), username: username.to_string(), uuid: Some(uuid.to_string()) };
        let account = Account { user, password: password.to_string(), token: token.to_string(), profile_pic: None };
        self.lock().accounts.insert(uuid.to_string(), account);
    }

    /// Start the simulation with `uuid` already logged in.
    pub fn log_in_as(&self, uuid: &str) {
        self.lock().current = Some(uuid.to_string());
    }

    /// Add a conversation to `uuid`'s list.
    pub fn add_chat(&self, uuid: &str, with: &str) {
        let mut state = self.lock();
        let Some(account) = state.accounts.get(with).cloned() else {
            return;
        };
        let summary =
            ChatSummary { convo_id: with.to_string(), name: account.user.username, profile_pic: account.profile_pic };
        state.chats.entry(uuid.to_string()).or_default().push(summary);
    }

    /// Currently logged-in user id.
    pub fn current_user(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Number of logout requests seen.
    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }
}

impl AuthBackend for SimBackend {
    fn verify_user(&self) -> impl Future<Output = Result<User, ClientError>> + Send {
        let result = self.lock().current().map(|account| account.user.clone()).ok_or_else(unauthorized);
        std::future::ready(result)
    }

    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<User, ClientError>> + Send {
        let mut state = self.lock();
        let found = state
            .accounts
            .iter()
            .find(|(_, account)| account.user.email == email && account.password == password)
            .map(|(uuid, account)| (uuid.clone(), account.user.clone()));
        let result = match found {
            Some((uuid, user)) => {
                state.current = Some(uuid);
                Ok(user)
            },
            None => Err(ClientError::Status { status: 401, message: "Invalid email or password".to_string() }),
        };
        std::future::ready(result)
    }

    fn logout(&self) -> impl Future<Output = Result<(), ClientError>> + Send {
        let mut state = self.lock();
        state.current = None;
        state.logouts += 1;
        std::future::ready(Ok(()))
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<ApiMessage, ClientError>> + Send {
        let mut state = self.lock();
        let result = if state.accounts.values().any(|account| account.user.email == email) {
            Err(ClientError::Status { status: 409, message: "Email already registered".to_string() })
        } else {
            let uuid = format!("user-{}", state.accounts.len() + 1);
            let user = User { email: email.to_string(), username: username.to_string(), uuid: Some(uuid.clone()) };
            let token = format!("token-{uuid}");
            state.accounts.insert(uuid, Account { user, password: password.to_string(), token, profile_pic: None });
            Ok(ApiMessage { message: Some("Registered successfully".to_string()) })
        };
        std::future::ready(result)
    }

    fn bearer_token(&self) -> String {
        self.lock().current().map(|account| account.token.clone()).unwrap_or_default()
    }
}

impl Directory for SimBackend {
    fn user_info(&self, uuid: &str) -> impl Future<Output = Result<UserInfo, ClientError>> + Send {
        let state = self.lock();
        let result = if state.current.is_none() {
            Err(unauthorized())
        } else {
            state
                .accounts
                .get(uuid)
                .map(|account| UserInfo { name: account.user.username.clone(), profile_pic: account.profile_pic.clone() })
                .ok_or_else(|| ClientError::Status { status: 404, message: "User not found".to_string() })
        };
        std::future::ready(result)
    }

    fn previous_chats(&self) -> impl Future<Output = Result<Vec<ChatSummary>, ClientError>> + Send {
        let state = self.lock();
        let result = match &state.current {
            Some(uuid) => Ok(state.chats.get(uuid).cloned().unwrap_or_default()),
            None => Err(unauthorized()),
        };
        std::future::ready(result)
    }
}
