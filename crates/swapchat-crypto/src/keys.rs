//! Session key pairs.

use std::fmt;

use rand::{CryptoRng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::{error::CryptoError, oaep, pem};

/// RSA modulus size in bits.
pub const KEY_BITS: usize = 2048;

/// RSA key pair for one conversation session.
///
/// The exported public key is computed once at generation so that every
/// `join_conversation` carries a byte-identical PEM.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    public_pem: String,
}

impl KeyPair {
    /// Generate a fresh 2048-bit key pair.
    ///
    /// # Errors
    ///
    /// Returns `CryptoUnavailable` if key generation or SPKI encoding fails.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(rng, KEY_BITS).map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        let public_pem = pem::export_public_key(&public)?;
        Ok(Self { private, public, public_pem })
    }

    /// Public half, for local encryption tests and fingerprinting.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// PEM envelope sent to the relay.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Decrypt base64 ciphertext addressed to this key pair.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, CryptoError> {
        oaep::decrypt_with(&self.private, ciphertext_b64)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("bits", &KEY_BITS).finish_non_exhaustive()
    }
}

/// Generate a fresh session key pair.
pub fn generate_key_pair<R: CryptoRng + RngCore>(rng: &mut R) -> Result<KeyPair, CryptoError> {
    KeyPair::generate(rng)
}
