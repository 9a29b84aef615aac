//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce.  The
//! cipher output is split into its three stored parts so the vault file
//! can keep them in separate fields:
//!
//! ```text
//! Sealed { ciphertext, iv: 12 bytes, tag: 16 bytes }
//! ```

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// The output of one AEAD encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Encrypt `plaintext` with a 32-byte `key` under a fresh random nonce.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut output = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    // aes-gcm appends the tag to the ciphertext.
    let tag = output.split_off(output.len() - TAG_LEN);

    Ok(Sealed {
        ciphertext: output,
        iv: nonce.to_vec(),
        tag,
    })
}

/// Decrypt a [`Sealed`] payload.
///
/// Fails with `DecryptionFailed` if the ciphertext, nonce or tag were
/// altered, or if the key is wrong.
pub fn decrypt(key: &[u8], sealed: &Sealed) -> Result<Vec<u8>> {
    if sealed.iv.len() != NONCE_LEN || sealed.tag.len() != TAG_LEN {
        return Err(VaultError::DecryptionFailed);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::DecryptionFailed)?;
    let nonce = Nonce::from_slice(&sealed.iv);

    let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&sealed.ciphertext);
    combined.extend_from_slice(&sealed.tag);

    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| VaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0xABu8; 32];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let sealed = encrypt(&KEY, b"[{\"id\":\"1\"}]").unwrap();
        assert_eq!(sealed.iv.len(), NONCE_LEN);
        assert_eq!(sealed.tag.len(), TAG_LEN);
        assert_eq!(decrypt(&KEY, &sealed).unwrap(), b"[{\"id\":\"1\"}]");
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let a = encrypt(&KEY, b"same").unwrap();
        let b = encrypt(&KEY, b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(&KEY, b"secret").unwrap();
        assert!(matches!(
            decrypt(&[0x11u8; 32], &sealed),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = encrypt(&KEY, b"secret").unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(decrypt(&KEY, &sealed).is_err());
    }

    #[test]
    fn tampered_tag_fails() {
        let mut sealed = encrypt(&KEY, b"secret").unwrap();
        sealed.tag[15] ^= 0x80;
        assert!(decrypt(&KEY, &sealed).is_err());
    }

    #[test]
    fn tampered_iv_fails() {
        let mut sealed = encrypt(&KEY, b"secret").unwrap();
        sealed.iv[0] ^= 0x01;
        assert!(decrypt(&KEY, &sealed).is_err());
    }

    #[test]
    fn truncated_iv_is_rejected() {
        let mut sealed = encrypt(&KEY, b"secret").unwrap();
        sealed.iv.truncate(8);
        assert!(decrypt(&KEY, &sealed).is_err());
    }

    #[test]
    fn invalid_key_length_fails_to_encrypt() {
        assert!(matches!(
            encrypt(&[0u8; 16], b"x"),
            Err(VaultError::EncryptionFailed(_))
        ));
    }
}
