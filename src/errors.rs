use std::time::Duration;

use thiserror::Error;

use crate::vault::lockout::format_remaining;

/// All errors that can occur in the Encryptoor vault engine.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Vault state errors ---
    #[error("The vault is not initialized.")]
    NotInitialized,

    #[error("A vault already exists at this location.")]
    AlreadyInitialized,

    #[error("The vault is tampered or unreadable: {0}")]
    InvalidVault(String),

    // --- Auth errors ---
    #[error("Wrong password. {0}")]
    WrongPassword(String),

    #[error("You cannot access the vault.")]
    Unauthorized,

    #[error("Please wait {} then retry", format_remaining(*remaining))]
    RateLimited { remaining: Duration },

    // --- Entry errors ---
    #[error("Invalid entry data: {0}")]
    InvalidEntry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Storage errors ---
    #[error("The disk is full, operation failed.")]
    DiskFull,

    #[error("Not allowed to write to the vault location.")]
    PermissionDenied,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- CLI errors ---
    #[error("{0}")]
    CommandFailed(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl VaultError {
    /// Stable machine-readable code for the presentation boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::InvalidVault(_) => "INVALID_VAULT",
            Self::WrongPassword(_) => "WRONG_PASSWORD",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidEntry(_) => "INVALID_ENTRY",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::DiskFull => "DISK_FULL",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::EncryptionFailed(_)
            | Self::DecryptionFailed
            | Self::KeyDerivationFailed(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::CommandFailed(_)
            | Self::Unexpected(_) => "UNEXPECTED",
        }
    }
}

/// Convenience type alias for Encryptoor results.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_message_uses_unit_selection() {
        let err = VaultError::RateLimited {
            remaining: Duration::from_secs(42),
        };
        assert_eq!(err.to_string(), "Please wait 42 seconds then retry");
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[test]
    fn plumbing_errors_collapse_to_unexpected() {
        let err = VaultError::Io(std::io::Error::other("boom"));
        assert_eq!(err.code(), "UNEXPECTED");
        assert_eq!(VaultError::DecryptionFailed.code(), "UNEXPECTED");
    }
}
