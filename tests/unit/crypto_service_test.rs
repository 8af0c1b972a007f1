//! Integration-level unit tests for the CryptoService public API.
//!
//! These tests exercise the sealing operations through the public trait,
//! the way the session vault uses them: derive a key from a passphrase,
//! seal a serialized session, open it again later.

use smartmark::services::crypto_service::{CryptoService, CryptoServiceTrait, KEY_LENGTH};

/// The vault's whole flow in one pass: derive a key, seal a payload,
/// open it with a freshly derived copy of the same key.
#[test]
fn test_derive_seal_open_roundtrip() {
    let service = CryptoService::new();
    let key = service.derive_key("machine-secret", b"per-install-salt").unwrap();

    let payload = br#"{"access_token":"abc","refresh_token":"def"}"#;
    let sealed = service.seal(payload, &key).unwrap();

    let rederived = service.derive_key("machine-secret", b"per-install-salt").unwrap();
    let opened = service.open(&sealed, &rederived).unwrap();
    assert_eq!(opened, payload);
}

/// Sealed blobs carry their own nonce, so a different service instance
/// can open them with nothing but the key.
#[test]
fn test_open_works_across_instances() {
    let sealer = CryptoService::new();
    let opener = CryptoService::new();
    let key = sealer.derive_key("machine-secret", b"per-install-salt").unwrap();

    let sealed = sealer.seal(b"session payload", &key).unwrap();
    assert_eq!(opener.open(&sealed, &key).unwrap(), b"session payload");
}

/// Different plaintexts must produce different blobs under the same key.
#[test]
fn test_different_plaintexts_produce_different_blobs() {
    let service = CryptoService::new();
    let key = service.derive_key("machine-secret", b"per-install-salt").unwrap();

    let sealed_a = service.seal(b"session for alice", &key).unwrap();
    let sealed_b = service.seal(b"session for bob", &key).unwrap();
    assert_ne!(sealed_a, sealed_b);
}

/// A key derived from a different passphrase must not open the blob.
#[test]
fn test_open_with_key_from_other_passphrase_fails() {
    let service = CryptoService::new();
    let key = service.derive_key("correct-secret", b"per-install-salt").unwrap();
    let wrong = service.derive_key("wrong-secret", b"per-install-salt").unwrap();

    let sealed = service.seal(b"session payload", &key).unwrap();
    assert!(service.open(&sealed, &wrong).is_err());
}

/// Blob layout is nonce (12) + ciphertext + tag (16).
#[test]
fn test_sealed_blob_length_overhead() {
    let service = CryptoService::new();
    let key = service.derive_key("machine-secret", b"per-install-salt").unwrap();

    let plaintext = b"0123456789";
    let sealed = service.seal(plaintext, &key).unwrap();
    assert_eq!(sealed.len(), 12 + plaintext.len() + 16);
}

/// The trait object form the session manager holds behaves the same.
#[test]
fn test_trait_object_usage() {
    let service: Box<dyn CryptoServiceTrait> = Box::new(CryptoService::new());
    let key = service.derive_key("machine-secret", b"per-install-salt").unwrap();
    assert_eq!(key.len(), KEY_LENGTH);

    let sealed = service.seal(b"payload", &key).unwrap();
    assert_eq!(service.open(&sealed, &key).unwrap(), b"payload");
}
