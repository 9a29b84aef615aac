//! Brute-force throttling for password checks.
//!
//! Failed attempts are counted in a small JSON file next to the vault:
//!
//! ```text
//! { "failedUnlocks": 0, "lockUntil": <epoch ms> }
//! ```
//!
//! After `max_attempts` consecutive failures a cooldown starts; while it
//! runs every attempt is refused without touching the KDF. When the
//! cooldown has passed, the next attempt resets the counter before it is
//! evaluated. A missing or malformed file is treated as tampering and
//! replaced with a fresh full cooldown.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};
use crate::storage::DurableStore;

/// Persisted failure counter and cooldown deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutMeta {
    pub failed_unlocks: u32,
    pub lock_until: i64,
}

/// Where the throttle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    /// No failures recorded.
    Idle,
    /// Failures recorded, no cooldown running.
    Armed { failed: u32 },
    /// Cooldown running.
    Cooling { remaining: Duration },
}

impl LockoutMeta {
    pub fn state(&self, now_ms: i64) -> LockoutState {
        if now_ms < self.lock_until {
            LockoutState::Cooling {
                remaining: millis(self.lock_until - now_ms),
            }
        } else if self.failed_unlocks > 0 {
            LockoutState::Armed {
                failed: self.failed_unlocks,
            }
        } else {
            LockoutState::Idle
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self)
            .map_err(|e| VaultError::Serialization(format!("lockout meta: {e}")))
    }
}

/// Applies the lockout policy against a [`DurableStore`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    max_attempts: u32,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Write a fresh, zeroed record (used when a vault is created).
    pub fn initialize(&self, store: &DurableStore) -> Result<()> {
        store.write_meta(&LockoutMeta::default().to_bytes()?)
    }

    /// Load the record, failing closed on anything unexpected.
    pub fn load(&self, store: &DurableStore, now_ms: i64) -> Result<LockoutMeta> {
        let parsed = store
            .read_meta()
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockoutMeta>(&bytes).ok());

        match parsed {
            Some(meta) => Ok(meta),
            None => {
                let penalty = LockoutMeta {
                    failed_unlocks: self.max_attempts,
                    lock_until: now_ms.saturating_add(millis_i64(self.cooldown)),
                };
                tracing::warn!(
                    path = %store.meta_file().display(),
                    "lockout metadata missing or malformed, applying full cooldown"
                );
                store.write_meta(&penalty.to_bytes()?)?;
                Ok(penalty)
            }
        }
    }

    /// Refuse while cooling; lazily reset an exhausted counter once the
    /// cooldown is over.
    pub fn check(&self, store: &DurableStore, meta: &mut LockoutMeta, now_ms: i64) -> Result<()> {
        match meta.state(now_ms) {
            LockoutState::Cooling { remaining } => Err(VaultError::RateLimited { remaining }),
            LockoutState::Armed { failed } if failed >= self.max_attempts => {
                *meta = LockoutMeta::default();
                store.write_meta(&meta.to_bytes()?)?;
                tracing::debug!("cooldown elapsed, failure counter reset");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Count a failed attempt, starting the cooldown when the limit is
    /// reached, and return the `WrongPassword` error to surface.
    pub fn record_failure(
        &self,
        store: &DurableStore,
        meta: &mut LockoutMeta,
        now_ms: i64,
    ) -> Result<VaultError> {
        meta.failed_unlocks = meta.failed_unlocks.saturating_add(1);

        let notice = if self.is_exhausted(meta) {
            meta.lock_until = now_ms.saturating_add(millis_i64(self.cooldown));
            format!("Please wait {}.", format_remaining(self.cooldown))
        } else {
            format!(
                "Remaining attempts: {}",
                self.max_attempts - meta.failed_unlocks
            )
        };

        store.write_meta(&meta.to_bytes()?)?;
        tracing::warn!(
            failed = meta.failed_unlocks,
            max = self.max_attempts,
            "wrong password"
        );

        Ok(VaultError::WrongPassword(notice))
    }

    /// Clear the counter after a successful check.
    pub fn record_success(&self, store: &DurableStore, meta: &mut LockoutMeta) -> Result<()> {
        *meta = LockoutMeta::default();
        store.write_meta(&meta.to_bytes()?)
    }

    pub fn is_exhausted(&self, meta: &LockoutMeta) -> bool {
        meta.failed_unlocks >= self.max_attempts
    }
}

/// Human-friendly remaining time: `1 second`, `N seconds` under a
/// minute, otherwise rounded-up minutes.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_millis().div_ceil(1000);
    if secs <= 1 {
        "1 second".to_string()
    } else if secs < 60 {
        format!("{secs} seconds")
    } else {
        match secs.div_ceil(60) {
            1 => "1 minute".to_string(),
            mins => format!("{mins} minutes"),
        }
    }
}

fn millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

fn millis_i64(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
