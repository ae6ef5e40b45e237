//! Scripted driver for running the application runtime in tests.
//!
//! A script is a queue of [`Step`]s. Actions are handed to the runtime one
//! at a time; `WaitUntil` steps pump relay events until the application
//! state satisfies a predicate or the deadline passes. When the script runs
//! out the driver reports [`DriverEvent::Closed`], which makes the runtime
//! tear down like a user closing the terminal.

use std::{collections::VecDeque, fmt, time::Duration};

use swapchat_app::{App, AppAction, Driver, DriverEvent};
use swapchat_core::{RelayAuth, RelayConnection, RelayConnector, TransportError};
use swapchat_proto::{ClientEvent, RelayEvent};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::sim_transport::{SimConnection, SimConnector};

/// How long a driver poll waits for relay traffic before yielding.
const POLL_WINDOW: Duration = Duration::from_millis(5);

type Predicate = Box<dyn Fn(&App) -> bool + Send>;

/// One step of a driver script.
pub enum Step {
    /// Hand an action to the runtime
    Act(AppAction),
    /// Pump relay events until the predicate holds
    WaitUntil {
        /// Shown when the deadline passes
        what: String,
        /// Condition on the application state
        until: Predicate,
    },
    /// Record a copy of the application state
    Snapshot,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Act(action) => f.debug_tuple("Act").field(action).finish(),
            Self::WaitUntil { what, .. } => f.debug_struct("WaitUntil").field("what", what).finish_non_exhaustive(),
            Self::Snapshot => f.write_str("Snapshot"),
        }
    }
}

impl Step {
    /// Wait until `until` holds.
    pub fn wait_until(what: impl Into<String>, until: impl Fn(&App) -> bool + Send + 'static) -> Self {
        Self::WaitUntil { what: what.into(), until: Box::new(until) }
    }
}

/// Scripted driver failures.
#[derive(Debug, Error)]
pub enum SimError {
    /// A wait step did not complete in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// Driver that replays a script against a simulated relay.
#[derive(Debug)]
pub struct ScriptedDriver {
    connector: SimConnector,
    connection: Option<SimConnection>,
    steps: VecDeque<Step>,
    deadline: Duration,
    waiting_since: Option<Instant>,
    relay_events: Vec<RelayEvent>,
    emitted: Vec<ClientEvent>,
    snapshots: Vec<App>,
    renders: usize,
    connects: usize,
    stopped: bool,
}

impl ScriptedDriver {
    /// Driver running `steps` against `connector`.
    pub fn new(connector: SimConnector, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            connector,
            connection: None,
            steps: steps.into_iter().collect(),
            deadline: Duration::from_secs(60),
            waiting_since: None,
            relay_events: Vec::new(),
            emitted: Vec::new(),
            snapshots: Vec::new(),
            renders: 0,
            connects: 0,
            stopped: false,
        }
    }

    /// Override how long a wait step may take.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Relay events handed to the runtime.
    pub fn relay_events(&self) -> &[RelayEvent] {
        &self.relay_events
    }

    /// Events the runtime emitted successfully.
    pub fn emitted(&self) -> &[ClientEvent] {
        &self.emitted
    }

    /// States recorded by [`Step::Snapshot`].
    pub fn snapshots(&self) -> &[App] {
        &self.snapshots
    }

    /// Number of renders.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Number of successful relay connections.
    pub fn connects(&self) -> usize {
        self.connects
    }

    /// Whether the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Steps not yet executed.
    pub fn remaining_steps(&self) -> usize {
        self.steps.len()
    }

    async fn poll_relay(&mut self) -> DriverEvent {
        let Some(connection) = self.connection.as_mut() else {
            tokio::time::sleep(POLL_WINDOW).await;
            return DriverEvent::Idle;
        };

        tokio::select! {
            event = connection.recv() => match event {
                Some(event) => {
                    self.relay_events.push(event.clone());
                    DriverEvent::Relay(event)
                },
                None => {
                    debug!("sim relay closed the connection");
                    self.connection = None;
                    DriverEvent::Idle
                },
            },
            () = tokio::time::sleep(POLL_WINDOW) => DriverEvent::Idle,
        }
    }
}

impl Driver for ScriptedDriver {
    type Error = SimError;

    async fn next_event(&mut self, app: &mut App) -> Result<DriverEvent, Self::Error> {
        match self.steps.front() {
            None => return Ok(DriverEvent::Closed),
            Some(Step::Act(_)) => {
                if let Some(Step::Act(action)) = self.steps.pop_front() {
                    return Ok(DriverEvent::Input(vec![action]));
                }
            },
            Some(Step::Snapshot) => {
                self.steps.pop_front();
                self.snapshots.push(app.clone());
                return Ok(DriverEvent::Idle);
            },
            Some(Step::WaitUntil { what, until }) => {
                if until(app) {
                    debug!(%what, "wait satisfied");
                    self.steps.pop_front();
                    self.waiting_since = None;
                    return Ok(DriverEvent::Idle);
                }
                let started = *self.waiting_since.get_or_insert_with(Instant::now);
                if started.elapsed() > self.deadline {
                    return Err(SimError::Timeout(what.clone()));
                }
            },
        }
        Ok(self.poll_relay().await)
    }

    async fn connect(&mut self, auth: &RelayAuth) -> Result<(), TransportError> {
        if let Some(mut previous) = self.connection.take() {
            previous.close().await;
        }
        let connection = self.connector.connect(auth).await?;
        self.connection = Some(connection);
        self.connects += 1;
        Ok(())
    }

    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        let connection = self.connection.as_mut().ok_or(TransportError::Closed)?;
        connection.emit(event.clone()).await?;
        self.emitted.push(event);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn render(&mut self, _app: &App) -> Result<(), Self::Error> {
        self.renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
