//! History gate.
//!
//! The relay may deliver a `message_received` before the history snapshot
//! it belongs after. The gate holds such messages until the snapshot has
//! been applied, then releases them in arrival order.

use swapchat_proto::WireMessage;

/// Buffer for messages that arrive ahead of history.
#[derive(Debug, Default)]
pub struct HistoryGate {
    open: bool,
    held: Vec<WireMessage>,
}

impl HistoryGate {
    /// Closed gate with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether history has been applied.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of messages waiting for history.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Admit a message.
    ///
    /// Returns it back when the gate is open, otherwise holds it.
    pub fn admit(&mut self, message: WireMessage) -> Option<WireMessage> {
        if self.open {
            Some(message)
        } else {
            self.held.push(message);
            None
        }
    }

    /// Open the gate and drain held messages in arrival order.
    pub fn open(&mut self) -> Vec<WireMessage> {
        self.open = true;
        std::mem::take(&mut self.held)
    }
}

#[cfg(test)]
mod tests {
    use swapchat_proto::{MessageKind, Timestamp};

    use super::*;

    fn msg(content: &str) -> WireMessage {
        WireMessage {
            kind: MessageKind::Text,
            content: content.into(),
            timestamp: Timestamp::default(),
            by_me: false,
            deleted: false,
        }
    }

    #[test]
    fn holds_until_open() {
        let mut gate = HistoryGate::new();
        assert!(gate.admit(msg("a")).is_none());
        assert!(gate.admit(msg("b")).is_none());
        assert_eq!(gate.held(), 2);

        let released: Vec<_> = gate.open().into_iter().map(|m| m.content).collect();
        assert_eq!(released, ["a", "b"]);
        assert!(gate.is_open());
        assert_eq!(gate.held(), 0);
    }

    #[test]
    fn passes_through_once_open() {
        let mut gate = HistoryGate::new();
        gate.open();
        assert_eq!(gate.admit(msg("c")), Some(msg("c")));
        assert_eq!(gate.held(), 0);
    }
}
