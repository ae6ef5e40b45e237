//! Generic runtime for Swapchat applications.
//!
//! The [`Runtime`] orchestrates the App, the [`Bridge`] and a [`Driver`],
//! handling all coordination logic. Platform-specific I/O is delegated to the
//! driver, so the same orchestration runs in the terminal and in simulation.
//!
//! Opening a conversation spawns key generation on the blocking pool and
//! connects to the relay at the same time. Whichever finishes second lets
//! the session join.

use std::{collections::VecDeque, time::Duration};

use swapchat_core::{
    CloseReason, RelayAuth, SessionAction, SessionConfig, SessionError, SessionEvent, TransportError,
    env::Environment,
};
use swapchat_crypto::{CryptoError, KeyPair, generate_key_pair};
use swapchat_proto::{ClientEvent, NAMESPACE};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    App, AppAction, AppEvent, Bridge,
    auth::{AuthBackend, AuthContext},
    driver::{Driver, DriverEvent},
    selection::{Directory, SessionSelection},
};

type KeygenResult = Result<KeyPair, CryptoError>;

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Relay WebSocket URL
    pub relay_url: String,
    /// Socket.IO namespace
    pub namespace: String,
    /// Settings for every opened session
    pub session: SessionConfig,
    /// How long leaving a conversation waits for the offline notification
    pub offline_grace: Duration,
    /// Conversation to open right after login, as from a direct link
    pub initial_selection: Option<SessionSelection>,
}

impl RuntimeConfig {
    /// Defaults for everything except the relay address.
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            namespace: NAMESPACE.to_string(),
            session: SessionConfig::default(),
            offline_grace: Duration::from_secs(2),
            initial_selection: None,
        }
    }
}

/// Runtime failures.
#[derive(Debug, Error)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// Driver I/O failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),
}

enum Step<E> {
    Keys(Result<KeygenResult, JoinError>),
    Driver(Result<DriverEvent, E>),
}

/// Generic application runtime.
#[derive(Debug)]
pub struct Runtime<D, B, E: Environment> {
    driver: D,
    app: App,
    bridge: Bridge<E>,
    auth: AuthContext<B>,
    env: E,
    config: RuntimeConfig,
    keygen: Option<JoinHandle<KeygenResult>>,
    dirty: bool,
    running: bool,
}

impl<D, B, E> Runtime<D, B, E>
where
    D: Driver,
    B: AuthBackend + Directory,
    E: Environment,
{
    /// Create a runtime.
    pub fn new(driver: D, backend: B, env: E, config: RuntimeConfig) -> Self {
        Self {
            driver,
            app: App::new(),
            bridge: Bridge::new(env.clone()),
            auth: AuthContext::new(backend),
            env,
            config,
            keygen: None,
            dirty: true,
            running: true,
        }
    }

    /// Application state.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Session bridge.
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Authentication context.
    pub fn auth(&self) -> &AuthContext<B> {
        &self.auth
    }

    /// Driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Run until the user quits or the input closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll or render.
    pub async fn run(&mut self) -> Result<(), RuntimeError<D::Error>> {
        self.start().await;

        while self.running {
            if self.dirty {
                self.driver.render(&self.app).map_err(RuntimeError::Driver)?;
                self.dirty = false;
            }

            let step = tokio::select! {
                biased;
                joined = join_keygen(&mut self.keygen), if self.keygen.is_some() => Step::Keys(joined),
                event = self.driver.next_event(&mut self.app) => Step::Driver(event),
            };

            match step {
                Step::Keys(joined) => {
                    self.keygen = None;
                    let follow = self.on_key_pair(joined).await;
                    self.execute_all(follow).await;
                },
                Step::Driver(event) => match event.map_err(RuntimeError::Driver)? {
                    DriverEvent::Input(actions) => self.execute_all(actions).await,
                    DriverEvent::Relay(event) => {
                        let result = self.bridge.deliver(event);
                        let follow = self.apply_session(result).await;
                        self.execute_all(follow).await;
                    },
                    DriverEvent::Idle => {},
                    DriverEvent::Closed => self.shutdown().await,
                },
            }
        }

        info!("runtime stopped");
        Ok(())
    }

    async fn start(&mut self) {
        let state = self.auth.initialize().await.clone();
        let actions = self.app.handle(AppEvent::AuthChanged(state));
        self.execute_all(actions).await;

        if let Some(selection) = self.config.initial_selection.take() {
            self.execute_all(vec![AppAction::OpenSession(selection)]).await;
        }
    }

    async fn execute_all(&mut self, actions: Vec<AppAction>) {
        let mut queue: VecDeque<AppAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            if !self.running {
                break;
            }
            let follow = self.execute(action).await;
            queue.extend(follow);
        }
    }

    async fn execute(&mut self, action: AppAction) -> Vec<AppAction> {
        debug!(?action, "executing");
        match action {
            AppAction::Render => {
                self.dirty = true;
                vec![]
            },
            AppAction::Quit => {
                self.shutdown().await;
                vec![]
            },
            AppAction::LoadChats => match self.auth.backend().previous_chats().await {
                Ok(chats) => self.app.handle(AppEvent::ChatsLoaded(chats)),
                Err(err) => {
                    warn!(%err, "failed to load conversations");
                    self.app.handle(AppEvent::Notice(format!("Could not load conversations: {err}")))
                },
            },
            AppAction::OpenSession(selection) => self.open_session(selection).await,
            AppAction::LeaveSession => self.leave_session().await,
            AppAction::SendText(_) | AppAction::SendFile(_) => {
                let Some(event) = Bridge::<E>::translate(&action) else {
                    return vec![];
                };
                let result = self.bridge.handle(event);
                self.apply_session(result).await
            },
            AppAction::Login { email, password } => {
                if let Err(err) = self.auth.login(&email, &password).await {
                    return self.app.handle(AppEvent::Notice(format!("Login failed: {err}")));
                }
                let state = self.auth.state().clone();
                self.app.handle(AppEvent::AuthChanged(state))
            },
            AppAction::Register { username, email, password } => {
                match self.auth.register(&username, &email, &password).await {
                    Ok(ack) => {
                        let message = ack.message.unwrap_or_else(|| "Account created".to_string());
                        self.app.handle(AppEvent::Notice(message))
                    },
                    Err(err) => self.app.handle(AppEvent::Notice(format!("Account creation failed: {err}"))),
                }
            },
            AppAction::Logout => {
                let mut follow = self.leave_session().await;
                self.auth.logout().await;
                let state = self.auth.state().clone();
                follow.extend(self.app.handle(AppEvent::AuthChanged(state)));
                follow
            },
            AppAction::Refresh => {
                let was_authenticated = self.auth.is_authenticated();
                let state = self.auth.refresh().await.clone();
                let still_authenticated = self.auth.is_authenticated();
                let mut follow = self.app.handle(AppEvent::AuthChanged(state));
                if was_authenticated && still_authenticated {
                    follow.push(AppAction::LoadChats);
                }
                follow
            },
        }
    }

    async fn open_session(&mut self, selection: SessionSelection) -> Vec<AppAction> {
        if !self.auth.is_authenticated() {
            return self.app.handle(AppEvent::Notice("Log in to open a conversation".to_string()));
        }

        let mut follow = self.leave_session().await;

        let counterpart = match selection.resolve(self.auth.backend()).await {
            Ok(counterpart) => counterpart,
            Err(err) => {
                warn!(%err, "could not resolve conversation");
                follow.extend(self.app.handle(AppEvent::Notice(format!("Could not open conversation: {err}"))));
                return follow;
            },
        };

        follow.extend(self.app.handle(AppEvent::SessionOpened(counterpart.clone())));
        self.bridge.open(counterpart, self.config.session);

        let mut rng = self.env.rng();
        self.keygen = Some(tokio::task::spawn_blocking(move || generate_key_pair(&mut rng)));

        let auth = RelayAuth {
            url: self.config.relay_url.clone(),
            namespace: self.config.namespace.clone(),
            token: self.auth.backend().bearer_token(),
        };
        let event = match self.driver.connect(&auth).await {
            Ok(()) => SessionEvent::TransportConnected,
            Err(err) => {
                warn!(%err, "relay connection failed");
                SessionEvent::TransportFailed { reason: err.to_string() }
            },
        };
        let result = self.bridge.handle(event);
        follow.extend(self.apply_session(result).await);
        follow
    }

    async fn leave_session(&mut self) -> Vec<AppAction> {
        if self.bridge.session().is_none() {
            return vec![];
        }

        let result = self.bridge.handle(SessionEvent::Teardown);
        let mut follow = self.apply_session(result).await;
        if !self.config.session.owns_transport {
            self.driver.disconnect().await;
        }

        self.bridge.close();
        self.keygen = None;
        follow.extend(self.app.handle(AppEvent::SessionClosed { reason: None }));
        follow
    }

    async fn shutdown(&mut self) {
        self.leave_session().await;
        self.driver.stop();
        self.running = false;
    }

    async fn on_key_pair(&mut self, joined: Result<KeygenResult, JoinError>) -> Vec<AppAction> {
        let event = match joined {
            Ok(Ok(keys)) => SessionEvent::KeyPairReady(keys),
            Ok(Err(err)) => SessionEvent::TransportFailed { reason: format!("key generation failed: {err}") },
            Err(err) => SessionEvent::TransportFailed { reason: format!("key generation aborted: {err}") },
        };
        let result = self.bridge.handle(event);
        self.apply_session(result).await
    }

    /// Execute session actions, feeding emit failures back as transport
    /// failures.
    async fn apply_session(&mut self, result: Result<Vec<SessionAction>, SessionError>) -> Vec<AppAction> {
        let actions = match result {
            Ok(actions) => actions,
            Err(err @ (SessionError::SendRejected(_) | SessionError::Crypto(_))) => {
                return self.app.handle(AppEvent::Notice(format!("Message not sent: {err}")));
            },
            Err(err @ SessionError::InvalidState { .. }) => {
                warn!(%err, "session rejected event");
                return vec![];
            },
        };

        let mut queue: VecDeque<SessionAction> = actions.into();
        let mut follow = Vec::new();
        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Emit(event) => {
                    if let Err(err) = self.emit(event).await {
                        warn!(%err, "relay emit failed");
                        match self.bridge.handle(SessionEvent::TransportFailed { reason: err.to_string() }) {
                            Ok(more) => queue.extend(more),
                            Err(err) => warn!(%err, "session rejected transport failure"),
                        }
                    }
                },
                SessionAction::Render | SessionAction::ShowDisconnected { .. } => {
                    if let Some(view) = self.bridge.view() {
                        follow.extend(self.app.handle(AppEvent::SessionUpdated(view)));
                    }
                },
                SessionAction::NavigateAway { reason } => {
                    follow.extend(self.navigate_away(reason).await);
                },
                SessionAction::DeregisterListeners => debug!("session listeners deregistered"),
                SessionAction::CloseTransport => self.driver.disconnect().await,
            }
        }
        follow
    }

    async fn navigate_away(&mut self, reason: CloseReason) -> Vec<AppAction> {
        info!(%reason, "leaving conversation view");
        self.bridge.close();
        self.keygen = None;
        self.driver.disconnect().await;
        self.app.handle(AppEvent::SessionClosed { reason: Some(reason) })
    }

    /// Offline notifications are best-effort and bounded by the grace
    /// period; everything else reports failures.
    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        if !matches!(event, ClientEvent::Offline { .. }) {
            return self.driver.emit(event).await;
        }

        tokio::select! {
            result = self.driver.emit(event) => {
                if let Err(err) = result {
                    warn!(%err, "offline notification not delivered");
                }
            },
            () = self.env.sleep(self.config.offline_grace) => warn!("offline notification timed out"),
        }
        Ok(())
    }
}

async fn join_keygen(handle: &mut Option<JoinHandle<KeygenResult>>) -> Result<KeygenResult, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
