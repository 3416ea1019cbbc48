//! At-rest encryption for message body text.
//!
//! Key derivation: HKDF-SHA256(salt, master_key, info) -> 256-bit AES key
//! Encryption: AES-256-GCM with random 12-byte nonce
//! Stored format: nonce (12 bytes) || ciphertext (includes GCM tag)
//!
//! The master key is 256 bits of randomness generated on first boot and
//! stored in the data directory; handlers only ever see plaintext.

use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::Rng;
use sha2::Sha256;
use thiserror::Error;

/// Salt for HKDF key derivation (domain separation)
const HKDF_SALT: &[u8] = b"taskhub-message-key-v1";

/// Info string for HKDF key derivation (purpose binding)
const HKDF_INFO: &[u8] = b"taskhub-message-body-encryption";

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Ciphertext too short (< {NONCE_LEN} bytes)")]
    TooShort,

    #[error("Decryption failed (wrong key or corrupted data)")]
    Decrypt,

    #[error("Decrypted bytes are not valid UTF-8")]
    Utf8,
}

/// Load or generate the 256-bit master key for message encryption.
/// Stored as raw bytes at data_dir/message_key, same handling as the
/// JWT signing key.
pub fn load_or_generate_message_key(
    data_dir: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("message_key");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("Message encryption key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!(
            "Message key file has wrong size ({}), regenerating",
            key.len()
        );
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("Message encryption key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Derive the AES-256-GCM message key from the stored master key.
fn derive_message_key(master_key: &[u8]) -> Key<Aes256Gcm> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master_key);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .expect("HKDF expand should not fail for 32-byte output");
    Key::<Aes256Gcm>::from(okm)
}

/// Encrypt message text for storage.
///
/// Returns `nonce (12 bytes) || ciphertext (includes 16-byte GCM tag)`.
pub fn encrypt_text(master_key: &[u8], plaintext: &str) -> Vec<u8> {
    let key = derive_message_key(master_key);
    let cipher = Aes256Gcm::new(&key);
    let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("AES-256-GCM encryption should not fail");

    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    result
}

/// Decrypt stored message text.
///
/// Fails distinctly on a wrong key or corrupted ciphertext (GCM tag check);
/// never returns wrong plaintext.
pub fn decrypt_text(master_key: &[u8], data: &[u8]) -> Result<String, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::TooShort);
    }
    let key = derive_message_key(master_key);
    let cipher = Aes256Gcm::new(&key);
    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
    let plaintext = cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|_| CryptoError::Decrypt)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_encrypt_decrypt() {
        let master = [7u8; 32];
        let encrypted = encrypt_text(&master, "hello");
        // nonce + plaintext + GCM tag
        assert_eq!(encrypted.len(), NONCE_LEN + 5 + 16);

        let decrypted = decrypt_text(&master, &encrypted).unwrap();
        assert_eq!(decrypted, "hello");
    }

    #[test]
    fn wrong_key_fails_decrypt() {
        let master = [1u8; 32];
        let other = [2u8; 32];
        let encrypted = encrypt_text(&master, "sensitive");
        assert!(matches!(
            decrypt_text(&other, &encrypted),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn malformed_ciphertext_fails() {
        let master = [3u8; 32];
        let mut encrypted = encrypt_text(&master, "tamper me");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xff;
        assert!(decrypt_text(&master, &encrypted).is_err());
    }

    #[test]
    fn too_short_data_fails() {
        let master = [4u8; 32];
        assert!(matches!(
            decrypt_text(&master, &[0u8; 5]),
            Err(CryptoError::TooShort)
        ));
    }

    #[test]
    fn nonces_are_unique_per_encryption() {
        let master = [5u8; 32];
        let a = encrypt_text(&master, "same text");
        let b = encrypt_text(&master, "same text");
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }
}
