//! Relay and client event decoding from arbitrary JSON arguments.

#![no_main]

use libfuzzer_sys::fuzz_target;
use swapchat_proto::{ClientEvent, RelayEvent};

const NAMES: [&str; 8] = [
    "join_conversation",
    "previous_chats",
    "message_sent",
    "offline",
    "message_received",
    "cantConnectWithSelf",
    "disconnect",
    "unknown_event",
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let name = NAMES[usize::from(selector) % NAMES.len()];
    let args = serde_json::from_slice::<serde_json::Value>(rest).ok();

    let _ = RelayEvent::decode(name, args.clone());
    if let Ok(event) = ClientEvent::decode(name, args) {
        let _ = ClientEvent::decode(event.name(), Some(event.to_args()));
    }
});
