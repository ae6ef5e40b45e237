//! Bridge between the App and the conversation session.
//!
//! Owns at most one [`Session`]. Translates user actions into session events,
//! gates relay delivery on listener registration and keeps the rendered
//! [`SessionView`] in sync.

use swapchat_core::{
    Counterpart, OutgoingMessage, Session, SessionAction, SessionConfig, SessionError, SessionEvent, env::Environment,
};
use swapchat_proto::RelayEvent;
use tracing::debug;

use crate::{AppAction, state::SessionView};

/// App ⇄ Session translation.
#[derive(Debug)]
pub struct Bridge<E: Environment> {
    env: E,
    session: Option<Session<E>>,
    listening: bool,
}

impl<E: Environment> Bridge<E> {
    /// Bridge with no open session.
    pub fn new(env: E) -> Self {
        Self { env, session: None, listening: false }
    }

    /// Open a session, replacing any previous one.
    ///
    /// Callers tear the previous session down first.
    pub fn open(&mut self, counterpart: Counterpart, config: SessionConfig) -> &Session<E> {
        debug!(to = %counterpart.to, "opening session");
        self.listening = true;
        self.session.insert(Session::new(self.env.clone(), counterpart, config))
    }

    /// Drop the session.
    pub fn close(&mut self) -> Option<Session<E>> {
        self.listening = false;
        self.session.take()
    }

    /// Open session, if any.
    pub fn session(&self) -> Option<&Session<E>> {
        self.session.as_ref()
    }

    /// Whether relay events are still delivered to the session.
    pub fn is_listening(&self) -> bool {
        self.listening && self.session.is_some()
    }

    /// Session event for a user action, if the action targets the session.
    pub fn translate(action: &AppAction) -> Option<SessionEvent> {
        match action {
            AppAction::SendText(text) => Some(SessionEvent::Send(OutgoingMessage::Text(text.clone()))),
            AppAction::SendFile(file) => Some(SessionEvent::Send(OutgoingMessage::File(file.clone()))),
            AppAction::LeaveSession => Some(SessionEvent::Teardown),
            _ => None,
        }
    }

    /// Feed an event to the session.
    ///
    /// Without an open session nothing happens.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        let Some(session) = self.session.as_mut() else {
            debug!(?event, "no open session");
            return Ok(vec![]);
        };
        let actions = session.handle(event)?;
        if actions.contains(&SessionAction::DeregisterListeners) {
            self.listening = false;
        }
        Ok(actions)
    }

    /// Deliver a relay event if listeners are registered.
    pub fn deliver(&mut self, event: RelayEvent) -> Result<Vec<SessionAction>, SessionError> {
        if !self.is_listening() {
            debug!(event = event.name(), "dropping relay event, no listeners");
            return Ok(vec![]);
        }
        self.handle(SessionEvent::Relay(event))
    }

    /// Render-ready view of the session.
    pub fn view(&self) -> Option<SessionView> {
        self.session.as_ref().map(SessionView::from_session)
    }
}
