//! PEM envelope for SPKI public keys.
//!
//! The layout is fixed so the export is deterministic:
//!
//! ```text
//! -----BEGIN PUBLIC KEY-----
//! <base64 SPKI DER, 64 chars per line>
//! -----END PUBLIC KEY-----
//! ```
//!
//! No trailing newline is written. Import accepts CRLF line endings and
//! surrounding whitespace but requires the exact `PUBLIC KEY` label.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{
    RsaPublicKey,
    pkcs8::{DecodePublicKey, EncodePublicKey},
};

use crate::error::CryptoError;

const HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const FOOTER: &str = "-----END PUBLIC KEY-----";
const LINE_WIDTH: usize = 64;

/// Export a public key as a PEM envelope.
///
/// # Errors
///
/// Returns `CryptoUnavailable` if the SPKI encoder fails.
pub fn export_public_key(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key.to_public_key_der().map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
    let body = STANDARD.encode(der.as_bytes());

    let mut pem = String::with_capacity(HEADER.len() + FOOTER.len() + body.len() + body.len() / LINE_WIDTH + 2);
    pem.push_str(HEADER);
    for (i, ch) in body.chars().enumerate() {
        if i % LINE_WIDTH == 0 {
            pem.push('\n');
        }
        pem.push(ch);
    }
    pem.push('\n');
    pem.push_str(FOOTER);
    Ok(pem)
}

/// Import a PEM envelope produced by [`export_public_key`] or the relay.
pub fn import_public_key(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    let trimmed = pem.trim();
    let inner = trimmed
        .strip_prefix(HEADER)
        .ok_or_else(|| CryptoError::MalformedKey("missing BEGIN PUBLIC KEY header".into()))?
        .strip_suffix(FOOTER)
        .ok_or_else(|| CryptoError::MalformedKey("missing END PUBLIC KEY footer".into()))?;

    let body: String = inner.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if body.is_empty() {
        return Err(CryptoError::MalformedKey("empty key body".into()));
    }

    let der = STANDARD.decode(body.as_bytes()).map_err(|e| CryptoError::MalformedKey(format!("invalid base64: {e}")))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::MalformedKey(format!("not an RSA SubjectPublicKeyInfo: {e}")))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::keys::KeyPair;

    fn keys() -> KeyPair {
        KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(11)).unwrap()
    }

    #[test]
    fn envelope_layout() {
        let keys = keys();
        let pem = keys.public_key_pem();
        let lines: Vec<&str> = pem.split('\n').collect();

        assert_eq!(lines.first(), Some(&HEADER));
        assert_eq!(lines.last(), Some(&FOOTER));
        assert!(!pem.ends_with('\n'));
        let body = &lines[1..lines.len() - 1];
        assert!(body[..body.len() - 1].iter().all(|line| line.len() == LINE_WIDTH));
        assert!(body.last().is_some_and(|line| !line.is_empty() && line.len() <= LINE_WIDTH));
    }

    #[test]
    fn export_is_deterministic() {
        let keys = keys();
        assert_eq!(export_public_key(keys.public_key()).unwrap(), keys.public_key_pem());
    }

    #[test]
    fn imported_key_exports_to_the_same_envelope() {
        let keys = keys();
        let imported = import_public_key(&format!("\r\n{}\r\n", keys.public_key_pem().replace('\n', "\r\n"))).unwrap();
        assert_eq!(export_public_key(&imported).unwrap(), keys.public_key_pem());
    }

    #[test]
    fn import_inverts_export() {
        let keys = keys();
        let imported = import_public_key(keys.public_key_pem()).unwrap();
        assert_eq!(&imported, keys.public_key());
    }

    #[test]
    fn import_accepts_crlf_and_padding_whitespace() {
        let keys = keys();
        let crlf = format!("\n  {}\r\n", keys.public_key_pem().replace('\n', "\r\n"));
        assert_eq!(&import_public_key(&crlf).unwrap(), keys.public_key());
    }

    #[test]
    fn import_rejects_wrong_label() {
        let keys = keys();
        let wrong = keys.public_key_pem().replace("PUBLIC KEY", "PRIVATE KEY");
        assert!(matches!(import_public_key(&wrong), Err(CryptoError::MalformedKey(_))));
    }

    #[test]
    fn import_rejects_missing_footer() {
        let keys = keys();
        let truncated = keys.public_key_pem().trim_end_matches(FOOTER);
        assert!(matches!(import_public_key(truncated), Err(CryptoError::MalformedKey(_))));
    }

    #[test]
    fn import_rejects_invalid_base64() {
        let pem = format!("{HEADER}\nnot*base64!\n{FOOTER}");
        assert!(matches!(import_public_key(&pem), Err(CryptoError::MalformedKey(_))));
    }

    #[test]
    fn import_rejects_non_key_der() {
        let pem = format!("{HEADER}\n{}\n{FOOTER}", STANDARD.encode(b"definitely not DER"));
        assert!(matches!(import_public_key(&pem), Err(CryptoError::MalformedKey(_))));
    }

    #[test]
    fn import_rejects_empty_body() {
        let pem = format!("{HEADER}\n\n{FOOTER}");
        assert!(matches!(import_public_key(&pem), Err(CryptoError::MalformedKey(_))));
    }
}
