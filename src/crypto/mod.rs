//! Cryptographic primitives for Encryptoor.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - scrypt password-based key derivation (`kdf`)
//! - Zeroizing key material (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key, ...};
pub use encryption::{decrypt, encrypt, Sealed};
pub use kdf::{derive_key, generate_salt, ScryptParams};
pub use keys::SecretKey;
