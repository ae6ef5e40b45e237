//! Engine.IO and Socket.IO packet decoding must never panic, and every
//! decoded packet must re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use swapchat_proto::{EnginePacket, SocketPacket};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(packet) = EnginePacket::decode(text) {
        let _ = packet.encode();
    }
    if let Ok(packet) = SocketPacket::decode(text) {
        let _ = packet.encode();
    }
});
