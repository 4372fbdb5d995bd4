//! End-to-end callback intake: AES-GCM decryption through the key
//! candidate chain, descriptor parsing and the session status machine.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_decimal::Decimal;

use kasirka_backend::crypto::DecryptionResolver;
use kasirka_backend::database::session_repository::CallbackPayload;
use kasirka_backend::database::SessionStatus;
use kasirka_backend::error::AppError;

fn encrypt(key: &[u8; 32], nonce: &[u8; 12], plaintext: &str) -> String {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
        .unwrap();
    let mut payload = nonce.to_vec();
    payload.extend_from_slice(&ciphertext);
    STANDARD.encode(payload)
}

#[test]
fn decrypts_and_parses_full_descriptor() {
    let key_text = "correct-horse-battery-staple-32!extra-ignored";
    let mut key = [0u8; 32];
    key.copy_from_slice(&key_text.as_bytes()[..32]);

    let descriptor = r#"{
        "InvoiceReference": "INV-2026-0001",
        "InvoiceId": "7731",
        "BilledEntityName": "Somchai Trading Co.",
        "SpaceId": "42",
        "SpaceName": "Sukhumvit Office",
        "Amount": 1499.50
    }"#;

    let resolver = DecryptionResolver::new(key_text);
    let encrypted = encrypt(&key, &[7u8; 12], descriptor);

    let plaintext = resolver.resolve(&encrypted).unwrap();
    let payload = CallbackPayload::from_json(&plaintext).unwrap();

    assert_eq!(payload.invoice_reference.as_deref(), Some("INV-2026-0001"));
    assert_eq!(payload.billed_entity_name.as_deref(), Some("Somchai Trading Co."));
    assert_eq!(payload.amount, Decimal::new(149950, 2));
}

#[test]
fn url_mangled_payload_still_decrypts() {
    let key_text = "0123456789abcdef0123456789abcdef";
    let mut key = [0u8; 32];
    key.copy_from_slice(key_text.as_bytes());

    let resolver = DecryptionResolver::new(key_text);
    let encrypted = encrypt(&key, &[1u8; 12], r#"{"Amount": 25}"#);

    // A '+' that survived URL transport as a space must be restored.
    let mangled = encrypted.replace('+', " ");
    let plaintext = resolver.resolve(&mangled).unwrap();
    assert!(plaintext.contains("25"));
}

#[test]
fn base64_encoded_key_candidate_is_tried() {
    let key = [0xA5u8; 32];
    let configured = STANDARD.encode(key);

    let resolver = DecryptionResolver::new(configured);
    let encrypted = encrypt(&key, &[9u8; 12], r#"{"Amount": 7}"#);

    assert!(resolver.resolve(&encrypted).is_ok());
}

#[test]
fn tampered_ciphertext_fails_closed() {
    let key_text = "0123456789abcdef0123456789abcdef";
    let mut key = [0u8; 32];
    key.copy_from_slice(key_text.as_bytes());

    let resolver = DecryptionResolver::new(key_text);
    let encrypted = encrypt(&key, &[1u8; 12], r#"{"Amount": 25}"#);

    let mut bytes = STANDARD.decode(&encrypted).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let tampered = STANDARD.encode(bytes);

    assert!(matches!(
        resolver.resolve(&tampered).unwrap_err(),
        AppError::DecryptionFailed
    ));
}

#[test]
fn descriptor_without_amount_is_rejected() {
    let raw = r#"{"InvoiceReference": "INV-1"}"#;
    assert!(CallbackPayload::from_json(raw).is_err());
}

#[test]
fn status_machine_is_monotonic_toward_failed() {
    use SessionStatus::*;

    assert!(Pending.can_transition(Success));
    assert!(Pending.can_transition(Failed));
    assert!(Success.can_transition(Failed));
    assert!(!Failed.can_transition(Success));

    // Replays are accepted without effect.
    assert!(Success.can_transition(Success));
    assert!(Failed.can_transition(Failed));
}
