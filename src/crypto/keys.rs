//! Symmetric key material.
//!
//! Two kinds of 256-bit key live in this crate:
//! - the random **vault key** that encrypts the entry payload, and
//! - the **KEK** derived from the master password that wraps the vault key.
//!
//! Both are held in [`SecretKey`], which zeroes its bytes on drop.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{Result, VaultError};

/// Length of every symmetric key (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// A 32-byte key that wipes its memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    /// An all-zero key buffer, to be filled by a KDF.
    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    /// Generate a fresh random vault key.
    pub fn generate() -> Self {
        let mut key = Self::zeroed();
        rand::rng().fill_bytes(&mut key.bytes);
        key
    }

    /// Build a key from an unwrapped buffer, wiping the source.
    pub fn from_slice(bytes: &mut [u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(VaultError::InvalidVault(format!(
                "vault key must be {KEY_LEN} bytes, got {len}"
            )));
        }
        let mut key = Self::zeroed();
        key.bytes.copy_from_slice(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_slice_wipes_source() {
        let mut raw = vec![0x5Au8; KEY_LEN];
        let key = SecretKey::from_slice(&mut raw).unwrap();
        assert_eq!(key.as_bytes(), &[0x5Au8; KEY_LEN]);
        assert!(raw.iter().all(|b| *b == 0));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let mut raw = vec![1u8; 16];
        assert!(SecretKey::from_slice(&mut raw).is_err());
        assert!(raw.iter().all(|b| *b == 0));
    }

    #[test]
    fn zeroize_clears_bytes() {
        let mut key = SecretKey::generate();
        key.zeroize();
        assert_eq!(key.as_bytes(), &[0u8; KEY_LEN]);
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = SecretKey::generate();
        assert_eq!(format!("{key:?}"), "SecretKey(***)");
    }
}
