use thiserror::Error;

/// Errors from key handling and message crypto.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The platform could not produce a key (RNG or primitive failure).
    #[error("crypto primitives unavailable: {0}")]
    CryptoUnavailable(String),

    /// PEM envelope, base64 body or DER structure is invalid.
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// Plaintext exceeds what one OAEP block can carry.
    #[error("payload too large: {len} bytes, at most {max} allowed")]
    PayloadTooLarge {
        /// Plaintext length in bytes
        len: usize,
        /// Largest plaintext the key accepts
        max: usize,
    },

    /// Ciphertext could not be decoded, decrypted or read as UTF-8.
    ///
    /// Deliberately carries no detail to avoid acting as a padding oracle.
    #[error("decryption failed")]
    DecryptionFailure,

    /// OAEP encryption failed for a reason other than size.
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),
}
