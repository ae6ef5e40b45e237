//! Public key import rejects malformed PEM without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use swapchat_crypto::import_public_key;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = import_public_key(text);
    }
});
