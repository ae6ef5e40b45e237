//! Line editor for the input bar.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Editor-level key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Printable character
    Char(char),
    /// Delete before the cursor
    Backspace,
    /// Delete under the cursor
    Delete,
    /// Cursor left
    Left,
    /// Cursor right
    Right,
    /// Cursor to start
    Home,
    /// Cursor to end
    End,
    /// Submit the line
    Enter,
    /// Leave the current view
    Esc,
    /// Previous list entry
    Up,
    /// Next list entry
    Down,
    /// Ctrl+C
    Interrupt,
}

impl KeyInput {
    /// Map a terminal key event. Unhandled keys map to `None`.
    pub fn from_event(event: KeyEvent) -> Option<Self> {
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return match event.code {
                KeyCode::Char('c' | 'd') => Some(Self::Interrupt),
                _ => None,
            };
        }
        Some(match event.code {
            KeyCode::Char(c) => Self::Char(c),
            KeyCode::Backspace => Self::Backspace,
            KeyCode::Delete => Self::Delete,
            KeyCode::Left => Self::Left,
            KeyCode::Right => Self::Right,
            KeyCode::Home => Self::Home,
            KeyCode::End => Self::End,
            KeyCode::Enter => Self::Enter,
            KeyCode::Esc => Self::Esc,
            KeyCode::Up => Self::Up,
            KeyCode::Down => Self::Down,
            _ => return None,
        })
    }
}

/// Input line with a cursor counted in characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    buffer: String,
    cursor: usize,
}

impl InputState {
    /// Empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether nothing has been typed.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn byte_index(&self) -> usize {
        self.buffer.char_indices().nth(self.cursor).map_or(self.buffer.len(), |(i, _)| i)
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    /// Apply an editing key. Returns the line on `Enter`, leaving the input
    /// empty. Keys that are not editing keys are ignored.
    pub fn apply(&mut self, key: KeyInput) -> Option<String> {
        match key {
            KeyInput::Char(c) => {
                let at = self.byte_index();
                self.buffer.insert(at, c);
                self.cursor += 1;
            },
            KeyInput::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = self.byte_index();
                self.buffer.remove(at);
            },
            KeyInput::Delete if self.cursor < self.len() => {
                let at = self.byte_index();
                self.buffer.remove(at);
            },
            KeyInput::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyInput::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyInput::Home => self.cursor = 0,
            KeyInput::End => self.cursor = self.len(),
            KeyInput::Enter => {
                self.cursor = 0;
                return Some(std::mem::take(&mut self.buffer));
            },
            _ => {},
        }
        None
    }
}
