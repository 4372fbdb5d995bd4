//! Callback payload decryption
//!
//! Inbound callbacks carry an AES-256-GCM payload (12-byte nonce, ciphertext,
//! 16-byte tag) that has usually been mangled by URL transport. The resolver
//! normalizes the base64 text and then tries an ordered list of key
//! interpretations, because the provider never documented whether the
//! configured callback key is UTF-8 text or a base64-encoded secret. The tag
//! is always verified; an unauthenticated payload is never surfaced.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::error::{AppError, AppResult};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Key kept for payloads sent before a callback key was configured.
const FALLBACK_KEY: &[u8; 32] = b"kasirka-default-callback-key-256";

/// One interpretation of the configured callback key.
///
/// Candidates are tried in declaration order; the first one whose
/// decryption authenticates wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCandidate {
    /// First 32 characters of the configured key, taken as UTF-8 bytes.
    Utf8Truncated,
    /// The configured key base64-decoded to raw bytes.
    Base64Decoded,
    /// The baked-in fallback key.
    BuiltinFallback,
}

pub const KEY_CANDIDATES: [KeyCandidate; 3] = [
    KeyCandidate::Utf8Truncated,
    KeyCandidate::Base64Decoded,
    KeyCandidate::BuiltinFallback,
];

impl KeyCandidate {
    /// Derive the 32-byte AES key for this interpretation, or `None` when
    /// the configured key cannot yield one (wrong length, bad base64).
    pub fn key_bytes(&self, configured: &str) -> Option<[u8; 32]> {
        match self {
            KeyCandidate::Utf8Truncated => {
                let truncated: String = configured.chars().take(32).collect();
                let bytes = truncated.as_bytes();
                if bytes.len() != 32 {
                    return None;
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Some(key)
            }
            KeyCandidate::Base64Decoded => {
                let decoded = BASE64.decode(configured.trim()).ok()?;
                if decoded.len() != 32 {
                    return None;
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(&decoded);
                Some(key)
            }
            KeyCandidate::BuiltinFallback => Some(*FALLBACK_KEY),
        }
    }
}

/// Decrypts provider callback payloads by hedging across key interpretations.
#[derive(Debug, Clone)]
pub struct DecryptionResolver {
    configured_key: String,
}

impl DecryptionResolver {
    pub fn new(configured_key: impl Into<String>) -> Self {
        Self {
            configured_key: configured_key.into(),
        }
    }

    /// Decrypt a callback payload into its plaintext JSON descriptor.
    pub fn resolve(&self, ciphertext: &str) -> AppResult<String> {
        let normalized = normalize_payload(ciphertext);
        let bytes = BASE64
            .decode(&normalized)
            .map_err(|e| AppError::MalformedPayload(format!("base64 decode: {}", e)))?;

        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(AppError::MalformedPayload(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }

        let nonce = Nonce::from_slice(&bytes[..NONCE_LEN]);
        // The tag trails the ciphertext, which is the layout the AEAD
        // primitive expects after the nonce is split off.
        let ciphertext_and_tag = &bytes[NONCE_LEN..];

        for candidate in KEY_CANDIDATES {
            let Some(key) = candidate.key_bytes(&self.configured_key) else {
                debug!(?candidate, "key candidate not derivable, skipping");
                continue;
            };

            let cipher = match Aes256Gcm::new_from_slice(&key) {
                Ok(cipher) => cipher,
                Err(_) => continue,
            };

            match cipher.decrypt(nonce, ciphertext_and_tag) {
                Ok(plaintext) => {
                    debug!(?candidate, "callback payload decrypted");
                    return String::from_utf8(plaintext)
                        .map_err(|_| AppError::MalformedPayload("plaintext not UTF-8".into()));
                }
                Err(_) => {
                    debug!(?candidate, "authentication failed for key candidate");
                }
            }
        }

        Err(AppError::DecryptionFailed)
    }
}

/// Repair base64 text damaged by URL transport.
///
/// URL decoding turns `+` into a space, proxies add whitespace, and some
/// clients strip padding. Strip anything outside the base64 alphabet and
/// re-pad to a multiple of four.
pub fn normalize_payload(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let mut cleaned: String = decoded
        .trim()
        .replace(' ', "+")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
        .collect();

    while cleaned.len() % 4 != 0 {
        cleaned.push('=');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn encrypt_with(key: &[u8; 32], nonce: &[u8; 12], plaintext: &str) -> String {
        let cipher = Aes256Gcm::new_from_slice(key).unwrap();
        let ct = cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .unwrap();
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ct);
        BASE64.encode(combined)
    }

    #[test]
    fn normalization_repairs_url_damage() {
        assert_eq!(normalize_payload("a b"), "a+b=");
        assert_eq!(normalize_payload("  QUJD  "), "QUJD");
        assert_eq!(normalize_payload("QU JD"), "QU+JD===");
        assert_eq!(normalize_payload("QUJD\n"), "QUJD");
        // percent-encoded plus survives
        assert_eq!(normalize_payload("QU%2BJD"), "QU+JD===");
    }

    #[test]
    fn resolves_with_utf8_key() {
        let mut key = [0u8; 32];
        key.copy_from_slice(TEST_KEY.as_bytes());
        let payload = encrypt_with(&key, &[7u8; 12], r#"{"amount":"500.00"}"#);

        let resolver = DecryptionResolver::new(TEST_KEY);
        let plain = resolver.resolve(&payload).unwrap();
        assert_eq!(plain, r#"{"amount":"500.00"}"#);
    }

    #[test]
    fn decryption_is_idempotent() {
        let mut key = [0u8; 32];
        key.copy_from_slice(TEST_KEY.as_bytes());
        let payload = encrypt_with(&key, &[9u8; 12], "stable plaintext");

        let resolver = DecryptionResolver::new(TEST_KEY);
        let first = resolver.resolve(&payload).unwrap();
        let second = resolver.resolve(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolves_with_base64_key() {
        let raw_key = [42u8; 32];
        let configured = BASE64.encode(raw_key);
        let payload = encrypt_with(&raw_key, &[1u8; 12], "hello");

        let resolver = DecryptionResolver::new(&configured);
        assert_eq!(resolver.resolve(&payload).unwrap(), "hello");
    }

    #[test]
    fn falls_back_to_builtin_key() {
        let payload = encrypt_with(FALLBACK_KEY, &[3u8; 12], "legacy");

        // configured key unusable in both interpretations
        let resolver = DecryptionResolver::new("short");
        assert_eq!(resolver.resolve(&payload).unwrap(), "legacy");
    }

    #[test]
    fn tampered_payload_fails_closed() {
        let mut key = [0u8; 32];
        key.copy_from_slice(TEST_KEY.as_bytes());
        let payload = encrypt_with(&key, &[5u8; 12], "authentic");

        let mut bytes = BASE64.decode(&payload).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01; // flip one tag bit
        let tampered = BASE64.encode(bytes);

        let resolver = DecryptionResolver::new(TEST_KEY);
        assert!(matches!(
            resolver.resolve(&tampered),
            Err(AppError::DecryptionFailed)
        ));
    }

    #[test]
    fn short_payload_is_malformed() {
        let resolver = DecryptionResolver::new(TEST_KEY);
        let short = BASE64.encode([1u8; 20]);
        assert!(matches!(
            resolver.resolve(&short),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn key_candidates_skip_underived() {
        assert!(KeyCandidate::Utf8Truncated.key_bytes("too short").is_none());
        assert!(KeyCandidate::Base64Decoded.key_bytes("!!!").is_none());
        assert!(KeyCandidate::BuiltinFallback.key_bytes("").is_some());

        let exact = KeyCandidate::Utf8Truncated.key_bytes(TEST_KEY).unwrap();
        assert_eq!(&exact, TEST_KEY.as_bytes());

        // longer keys truncate to the first 32 characters
        let long = format!("{}extra", TEST_KEY);
        assert_eq!(KeyCandidate::Utf8Truncated.key_bytes(&long).unwrap(), exact);
    }
}
