//! Vault module: encrypted credential storage and the unlocked session.
//!
//! This module provides:
//! - `Entry` and the sanitizer that admits entries (`entry`)
//! - The JSON vault file with envelope encryption (`format`)
//! - Brute-force throttling (`lockout`)
//! - The in-memory `Session` (`session`)
//! - Non-destructive import reconciliation (`merge`)
//! - `VaultEngine`, which ties them together (`engine`)

pub mod engine;
pub mod entry;
pub mod format;
pub mod lockout;
pub mod merge;
pub mod session;

// Re-export the most commonly used items.
pub use engine::{ImportOutcome, ImportSource, SharedEngine, VaultEngine};
pub use entry::{Entry, LoginEntry, NoteEntry};
pub use format::VaultFile;
pub use lockout::{LockoutMeta, RateLimiter};
pub use merge::ImportStatus;
pub use session::{LockReason, OwnerRef, VaultEvent};
