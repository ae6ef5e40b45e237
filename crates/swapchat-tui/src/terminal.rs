//! Terminal driver.
//!
//! Implements [`Driver`] with crossterm input, ratatui rendering and the
//! Socket.IO relay transport. Orchestration stays in the generic runtime.

use std::fmt;

use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use swapchat_app::{App, AppAction, Driver, DriverEvent, Screen, SessionSelection};
use swapchat_client::{SocketIoConnection, SocketIoConnector};
use swapchat_core::{RelayAuth, RelayConnection, RelayConnector, TransportError};
use swapchat_proto::{ClientEvent, FileData, RelayEvent};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    commands::{Command, OpenTarget, parse},
    input::{InputState, KeyInput},
    ui,
};

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// Terminal I/O failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Driver for an interactive terminal.
pub struct TerminalDriver {
    terminal: DefaultTerminal,
    events: EventStream,
    input: InputState,
    connector: SocketIoConnector,
    connection: Option<SocketIoConnection>,
    restored: bool,
}

impl fmt::Debug for TerminalDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalDriver")
            .field("input", &self.input)
            .field("connected", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

impl TerminalDriver {
    /// Switch the terminal to raw mode on the alternate screen.
    pub fn new(connector: SocketIoConnector) -> Result<Self, TerminalError> {
        let terminal = ratatui::try_init()?;
        Ok(Self {
            terminal,
            events: EventStream::new(),
            input: InputState::new(),
            connector,
            connection: None,
            restored: false,
        })
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(err) = ratatui::try_restore() {
            warn!(%err, "failed to restore terminal");
        }
    }

    fn on_key(&mut self, key: KeyInput, app: &mut App) -> Vec<AppAction> {
        match (key, app.screen()) {
            (KeyInput::Interrupt, _) => vec![AppAction::Quit],
            (KeyInput::Up, Screen::ChatList) => {
                app.select_previous();
                vec![AppAction::Render]
            },
            (KeyInput::Down, Screen::ChatList) => {
                app.select_next();
                vec![AppAction::Render]
            },
            (KeyInput::Esc, Screen::Conversation) => vec![AppAction::LeaveSession],
            (KeyInput::Enter, Screen::ChatList) if self.input.is_empty() => {
                app.open_selected().into_iter().collect()
            },
            (key, _) => match self.input.apply(key) {
                Some(line) => actions_for(parse(&line), app),
                None => vec![AppAction::Render],
            },
        }
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Actions for a parsed command. Problems the user can fix are reported on
/// the status line.
pub fn actions_for(command: Command, app: &mut App) -> Vec<AppAction> {
    let in_conversation = app.screen() == Screen::Conversation;
    match command {
        Command::Message { content } if content.is_empty() => vec![AppAction::Render],
        Command::Message { .. } | Command::SendFile { .. } if !in_conversation => {
            app.set_status("Open a conversation first");
            vec![AppAction::Render]
        },
        Command::Message { content } => vec![AppAction::SendText(content)],
        Command::SendFile { name, mime, path } => match std::fs::read(&path) {
            Ok(buffer) => vec![AppAction::SendFile(FileData { name, buffer, mime })],
            Err(err) => {
                app.set_status(format!("Cannot read {path}: {err}"));
                vec![AppAction::Render]
            },
        },
        Command::Open { target: OpenTarget::Index(index) } => {
            match index.checked_sub(1).and_then(|i| app.open_index(i)) {
                Some(action) => vec![action],
                None => {
                    app.set_status(format!("No conversation at position {index}"));
                    vec![AppAction::Render]
                },
            }
        },
        Command::Open { target: OpenTarget::Uuid(uuid) } => {
            vec![AppAction::OpenSession(SessionSelection::DirectLink { uuid })]
        },
        Command::Back => vec![AppAction::LeaveSession],
        Command::Refresh => vec![AppAction::Refresh],
        Command::Login { email, password } => vec![AppAction::Login { email, password }],
        Command::Register { username, email, password } => {
            vec![AppAction::Register { username, email, password }]
        },
        Command::Logout => vec![AppAction::Logout],
        Command::Quit => vec![AppAction::Quit],
        Command::Unknown { input } => {
            app.set_status(format!("Unknown command: {input}"));
            vec![AppAction::Render]
        },
        Command::InvalidArgs { error, .. } => {
            app.set_status(error);
            vec![AppAction::Render]
        },
    }
}

async fn next_relay(connection: &mut Option<SocketIoConnection>) -> Option<RelayEvent> {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;

    async fn next_event(&mut self, app: &mut App) -> Result<DriverEvent, Self::Error> {
        tokio::select! {
            event = self.events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    let actions = KeyInput::from_event(key).map(|key| self.on_key(key, app)).unwrap_or_default();
                    Ok(DriverEvent::Input(actions))
                },
                Some(Ok(Event::Resize(..))) => Ok(DriverEvent::Input(vec![AppAction::Render])),
                Some(Ok(_)) => Ok(DriverEvent::Idle),
                Some(Err(err)) => Err(TerminalError::Io(err)),
                None => Ok(DriverEvent::Closed),
            },
            event = next_relay(&mut self.connection) => match event {
                Some(event) => Ok(DriverEvent::Relay(event)),
                None => {
                    debug!("relay connection ended");
                    self.connection = None;
                    Ok(DriverEvent::Idle)
                },
            },
        }
    }

    async fn connect(&mut self, auth: &RelayAuth) -> Result<(), TransportError> {
        if let Some(mut previous) = self.connection.take() {
            previous.close().await;
        }
        self.connection = Some(self.connector.connect(auth).await?);
        Ok(())
    }

    async fn emit(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        match self.connection.as_mut() {
            Some(connection) => connection.emit(event).await,
            None => Err(TransportError::Closed),
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        self.terminal.draw(|frame| ui::draw(frame, app, &self.input))?;
        Ok(())
    }

    fn stop(&mut self) {
        self.restore();
    }
}
