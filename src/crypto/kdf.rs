//! Password-based key derivation using scrypt.
//!
//! scrypt is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  The cost parameters travel with every vault
//! header (`ScryptParams`) so a vault written under older settings can
//! still be opened after the defaults are raised.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{SecretKey, KEY_LEN};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Smallest accepted `log2(N)`.
const MIN_LOG_N: u8 = 10;

/// Largest accepted `log2(N)`; anything above is refused before any work
/// is done so a hostile header cannot pin the CPU.
const MAX_LOG_N: u8 = 20;

/// Default memory ceiling (64 MiB). Also the hard cap: a header may ask
/// for less, never more.
const DEFAULT_MAXMEM: u64 = 64 * 1024 * 1024;

/// Largest accepted block size.
const MAX_R: u32 = 32;

/// Largest accepted parallelism.
const MAX_P: u32 = 16;

/// scrypt cost parameters, serialized into the vault header as
/// `{"N": 32768, "r": 8, "p": 1, "maxmem": 67108864}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost; must be a power of two.
    #[serde(rename = "N")]
    pub n: u64,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
    /// Upper bound on memory the derivation may use, in bytes.
    #[serde(default = "default_maxmem")]
    pub maxmem: u64,
}

fn default_maxmem() -> u64 {
    DEFAULT_MAXMEM
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self {
            n: 1 << 15,
            r: 8,
            p: 1,
            maxmem: DEFAULT_MAXMEM,
        }
    }
}

impl ScryptParams {
    /// Build parameters from a `log2(N)` value (the form used in settings).
    pub fn from_log_n(log_n: u8, r: u32, p: u32) -> Self {
        Self {
            n: 1u64 << log_n.min(63),
            r,
            p,
            maxmem: DEFAULT_MAXMEM,
        }
    }

    /// Check the parameters and return `log2(N)`.
    ///
    /// Rejects a non-power-of-two `N`, a cost outside the accepted range,
    /// and any combination whose working set exceeds `maxmem` or the
    /// engine's own 64 MiB ceiling, whichever is lower.
    pub fn validate(&self) -> Result<u8> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(VaultError::KeyDerivationFailed(format!(
                "scrypt N must be a power of two (got {})",
                self.n
            )));
        }
        // `n` is a power of two below 2^64, so this fits in a u8.
        let log_n = self.n.trailing_zeros() as u8;
        if !(MIN_LOG_N..=MAX_LOG_N).contains(&log_n) {
            return Err(VaultError::KeyDerivationFailed(format!(
                "scrypt log2(N) must be within {MIN_LOG_N}..={MAX_LOG_N} (got {log_n})"
            )));
        }
        if !(1..=MAX_R).contains(&self.r) || !(1..=MAX_P).contains(&self.p) {
            return Err(VaultError::KeyDerivationFailed(format!(
                "scrypt r must be within 1..={MAX_R} and p within 1..={MAX_P} (got r={}, p={})",
                self.r, self.p
            )));
        }

        let limit = self.maxmem.min(DEFAULT_MAXMEM);
        let working_set = 128u64
            .saturating_mul(u64::from(self.r))
            .saturating_mul(self.n)
            .saturating_mul(u64::from(self.p));
        if working_set > limit {
            return Err(VaultError::KeyDerivationFailed(format!(
                "scrypt parameters need {working_set} bytes, above the {limit} byte limit"
            )));
        }

        Ok(log_n)
    }
}

/// Derive a 32-byte key-encrypting key from a password and salt.
///
/// The same password + salt + params always produce the same key.
pub fn derive_key(password: &[u8], salt: &[u8], params: &ScryptParams) -> Result<SecretKey> {
    let log_n = params.validate()?;

    let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, KEY_LEN)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid scrypt params: {e}")))?;

    let mut key = SecretKey::zeroed();
    scrypt::scrypt(password, salt, &scrypt_params, key.as_mut_bytes())
        .map_err(|e| VaultError::KeyDerivationFailed(format!("scrypt failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
