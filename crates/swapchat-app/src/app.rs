//! Application state machine.
//!
//! Holds everything a front-end renders: the login state, the conversation
//! list with its cursor, the open conversation and a status line.

use swapchat_proto::rest::{ChatSummary, User};

use crate::{AppAction, AppEvent, auth::AuthState, selection::SessionSelection, state::SessionView};

/// Which screen is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Login check has not finished
    Loading,
    /// Not logged in
    Login,
    /// Conversation list
    ChatList,
    /// A single conversation
    Conversation,
}

/// Application state.
#[derive(Debug, Clone)]
pub struct App {
    screen: Screen,
    user: Option<User>,
    chats: Vec<ChatSummary>,
    selected: usize,
    session: Option<SessionView>,
    status: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Empty state on the loading screen.
    pub fn new() -> Self {
        Self { screen: Screen::Loading, user: None, chats: Vec::new(), selected: 0, session: None, status: None }
    }

    /// Current screen.
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Logged-in user.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Conversation list.
    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    /// Cursor position in the conversation list.
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Open conversation.
    pub fn session(&self) -> Option<&SessionView> {
        self.session.as_ref()
    }

    /// Status line.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Set the status line.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Move the cursor down, wrapping.
    pub fn select_next(&mut self) {
        if !self.chats.is_empty() {
            self.selected = (self.selected + 1) % self.chats.len();
        }
    }

    /// Move the cursor up, wrapping.
    pub fn select_previous(&mut self) {
        if !self.chats.is_empty() {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.chats.len() - 1);
        }
    }

    /// Action opening the conversation under the cursor.
    pub fn open_selected(&self) -> Option<AppAction> {
        self.open_index(self.selected)
    }

    /// Action opening the conversation at `index` in the list.
    pub fn open_index(&self, index: usize) -> Option<AppAction> {
        self.chats.get(index).map(|chat| AppAction::OpenSession(SessionSelection::Listed(chat.clone())))
    }

    /// Apply an event and return follow-up actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::AuthChanged(state) => {
                let was_authenticated = self.user.is_some();
                self.user = state.user().cloned();
                match (&state, was_authenticated) {
                    (AuthState::Authenticated(_), false) => {
                        if self.screen != Screen::Conversation {
                            self.screen = Screen::ChatList;
                        }
                        return vec![AppAction::LoadChats, AppAction::Render];
                    },
                    (AuthState::Authenticated(_), true) => {},
                    (AuthState::Anonymous | AuthState::Unknown, _) => {
                        self.screen = if state == AuthState::Unknown { Screen::Loading } else { Screen::Login };
                        self.chats.clear();
                        self.selected = 0;
                        self.session = None;
                    },
                }
            },
            AppEvent::ChatsLoaded(chats) => {
                self.chats = chats;
                self.selected = self.selected.min(self.chats.len().saturating_sub(1));
            },
            AppEvent::SessionOpened(counterpart) => {
                self.session = Some(SessionView::connecting(counterpart));
                self.screen = Screen::Conversation;
            },
            AppEvent::SessionUpdated(view) => {
                if let Some(notice) = &view.notice {
                    self.status = Some(notice.clone());
                }
                self.session = Some(view);
            },
            AppEvent::SessionClosed { reason } => {
                self.session = None;
                if let Some(reason) = reason {
                    self.status = Some(reason.to_string());
                }
                if self.screen == Screen::Conversation {
                    self.screen = if self.user.is_some() { Screen::ChatList } else { Screen::Login };
                }
            },
            AppEvent::Notice(message) => self.status = Some(message),
        }
        vec![AppAction::Render]
    }
}
