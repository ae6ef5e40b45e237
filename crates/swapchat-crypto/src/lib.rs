//! Per-session key exchange and message encryption.
//!
//! Each conversation view generates a fresh RSA-2048 key pair. The public
//! half goes to the relay inside `join_conversation`; the relay answers with
//! its own public key in the history snapshot. Outgoing text is encrypted to
//! the relay key, incoming text is encrypted to ours.
//!
//! All encryption uses RSA-OAEP with SHA-256 for both the digest and MGF1,
//! matching the WebCrypto `RSA-OAEP`/`SHA-256` parameters the relay expects.
//! Keys travel as SPKI DER inside a PEM envelope.
//!
//! # Security
//!
//! Key pairs live only in memory and are dropped with the session. There is
//! no API to export a private key. OAEP with a 2048-bit modulus caps a
//! single message at [`MAX_PLAINTEXT_LEN`] bytes; longer text is rejected
//! rather than chunked.

mod error;
mod keys;
mod oaep;
mod pem;

pub use error::CryptoError;
pub use keys::{KEY_BITS, KeyPair, generate_key_pair};
pub use oaep::{MAX_PLAINTEXT_LEN, decrypt_with, encrypt_for, max_plaintext_len};
pub use pem::{export_public_key, import_public_key};
pub use rsa::RsaPublicKey;
