//! RSA-OAEP message encryption.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use sha2::Sha256;

use crate::{error::CryptoError, keys::KEY_BITS};

/// OAEP overhead with SHA-256: two digests plus two framing bytes.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// Largest plaintext, in bytes, for a [`KEY_BITS`] key.
pub const MAX_PLAINTEXT_LEN: usize = KEY_BITS / 8 - OAEP_OVERHEAD;

/// Largest plaintext, in bytes, the given key can encrypt in one block.
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(OAEP_OVERHEAD)
}

/// Encrypt UTF-8 text to `key` and return base64 ciphertext.
///
/// # Errors
///
/// Returns `PayloadTooLarge` before touching the key when `plaintext` does
/// not fit in one OAEP block.
pub fn encrypt_for<R: CryptoRng + RngCore>(
    key: &RsaPublicKey,
    plaintext: &str,
    rng: &mut R,
) -> Result<String, CryptoError> {
    let max = max_plaintext_len(key);
    let len = plaintext.len();
    if len > max {
        return Err(CryptoError::PayloadTooLarge { len, max });
    }

    let ciphertext = key
        .encrypt(rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))?;
    Ok(STANDARD.encode(ciphertext))
}

/// Decrypt base64 ciphertext with `key`.
///
/// Every failure collapses to `DecryptionFailure`.
pub fn decrypt_with(key: &RsaPrivateKey, ciphertext_b64: &str) -> Result<String, CryptoError> {
    let ciphertext = STANDARD.decode(ciphertext_b64.trim().as_bytes()).map_err(|_| CryptoError::DecryptionFailure)?;
    let plaintext = key.decrypt(Oaep::new::<Sha256>(), &ciphertext).map_err(|_| CryptoError::DecryptionFailure)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailure)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::keys::KeyPair;

    fn setup() -> (KeyPair, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let keys = KeyPair::generate(&mut rng).unwrap();
        (keys, rng)
    }

    #[test]
    fn max_len_for_2048_bit_keys() {
        let (keys, _) = setup();
        assert_eq!(MAX_PLAINTEXT_LEN, 190);
        assert_eq!(max_plaintext_len(keys.public_key()), MAX_PLAINTEXT_LEN);
    }

    #[test]
    fn encrypt_then_decrypt() {
        let (keys, mut rng) = setup();
        let ciphertext = encrypt_for(keys.public_key(), "see you at the library", &mut rng).unwrap();
        assert_eq!(keys.decrypt(&ciphertext).unwrap(), "see you at the library");
    }

    #[test]
    fn ciphertext_is_randomized() {
        let (keys, mut rng) = setup();
        let a = encrypt_for(keys.public_key(), "same", &mut rng).unwrap();
        let b = encrypt_for(keys.public_key(), "same", &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn boundary_length_fits() {
        let (keys, mut rng) = setup();
        let text = "x".repeat(MAX_PLAINTEXT_LEN);
        let ciphertext = encrypt_for(keys.public_key(), &text, &mut rng).unwrap();
        assert_eq!(keys.decrypt(&ciphertext).unwrap(), text);
    }

    #[test]
    fn one_byte_over_is_rejected() {
        let (keys, mut rng) = setup();
        let text = "x".repeat(MAX_PLAINTEXT_LEN + 1);
        assert_eq!(
            encrypt_for(keys.public_key(), &text, &mut rng),
            Err(CryptoError::PayloadTooLarge { len: 191, max: 190 })
        );
    }

    #[test]
    fn limit_counts_bytes_not_chars() {
        let (keys, mut rng) = setup();
        // 96 two-byte characters = 192 bytes
        let text = "é".repeat(96);
        assert!(matches!(
            encrypt_for(keys.public_key(), &text, &mut rng),
            Err(CryptoError::PayloadTooLarge { len: 192, .. })
        ));
    }

    #[test]
    fn garbage_input_fails_to_decrypt() {
        let (keys, _) = setup();
        assert_eq!(keys.decrypt("%%% not base64"), Err(CryptoError::DecryptionFailure));
        assert_eq!(keys.decrypt(&STANDARD.encode([7u8; 256])), Err(CryptoError::DecryptionFailure));
        assert_eq!(keys.decrypt(""), Err(CryptoError::DecryptionFailure));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let (keys, mut rng) = setup();
        let other = KeyPair::generate(&mut rng).unwrap();
        let ciphertext = encrypt_for(other.public_key(), "for someone else", &mut rng).unwrap();
        assert_eq!(keys.decrypt(&ciphertext), Err(CryptoError::DecryptionFailure));
    }
}
