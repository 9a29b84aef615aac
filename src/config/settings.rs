use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clipboard::ClipboardTiming;
use crate::crypto::ScryptParams;
use crate::errors::{Result, VaultError};

/// Engine configuration, loaded from `.encryptoor.toml`.
///
/// Every field has a default so Encryptoor works without any config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to the base dir) holding the vault and its backups.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// Directory (relative to the base dir) where exports are written.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Seconds of inactivity before the session locks itself.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Consecutive wrong passwords before the cooldown starts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Cooldown length in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Seconds a copied secret stays on the clipboard.
    #[serde(default = "default_clipboard_clear_secs")]
    pub clipboard_clear_secs: u64,

    /// Milliseconds the decoy stays before the real secret is written.
    #[serde(default = "default_clipboard_decoy_ms")]
    pub clipboard_decoy_ms: u64,

    /// Largest foreign vault accepted by import, in bytes.
    #[serde(default = "default_import_max_bytes")]
    pub import_max_bytes: u64,

    /// scrypt cost as log2(N) for newly written headers (default: 15).
    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,

    /// scrypt block size (default: 8).
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    /// scrypt parallelism (default: 1).
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,

    /// Lock the session when a debugger attaches.
    #[serde(default = "default_lock_on_debugger")]
    pub lock_on_debugger: bool,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Concrete locations derived from [`Settings`] and a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub vault_dir: PathBuf,
    pub vault_file: PathBuf,
    pub meta_file: PathBuf,
    pub export_dir: PathBuf,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_dir() -> String {
    ".encryptoor".to_string()
}

fn default_export_dir() -> String {
    ".".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    900 // 15 minutes
}

fn default_clipboard_clear_secs() -> u64 {
    30
}

fn default_clipboard_decoy_ms() -> u64 {
    200
}

fn default_import_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_scrypt_log_n() -> u8 {
    15
}

fn default_scrypt_r() -> u32 {
    8
}

fn default_scrypt_p() -> u32 {
    1
}

fn default_lock_on_debugger() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            export_dir: default_export_dir(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_attempts: default_max_attempts(),
            cooldown_secs: default_cooldown_secs(),
            clipboard_clear_secs: default_clipboard_clear_secs(),
            clipboard_decoy_ms: default_clipboard_decoy_ms(),
            import_max_bytes: default_import_max_bytes(),
            scrypt_log_n: default_scrypt_log_n(),
            scrypt_r: default_scrypt_r(),
            scrypt_p: default_scrypt_p(),
            lock_on_debugger: default_lock_on_debugger(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Name of the config file looked up in the base directory.
    pub const FILE_NAME: &'static str = ".encryptoor.toml";

    /// Load settings from `<base_dir>/.encryptoor.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.scrypt_params().validate()?;
        Ok(settings)
    }

    /// Resolve every on-disk location against `base_dir`.
    pub fn paths(&self, base_dir: &Path) -> VaultPaths {
        let vault_dir = base_dir.join(&self.vault_dir);
        VaultPaths {
            vault_file: vault_dir.join("vault.json"),
            meta_file: vault_dir.join("vault.meta.json"),
            export_dir: base_dir.join(&self.export_dir),
            vault_dir,
        }
    }

    /// KDF parameters for newly written headers.
    pub fn scrypt_params(&self) -> ScryptParams {
        ScryptParams::from_log_n(self.scrypt_log_n, self.scrypt_r, self.scrypt_p)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn clipboard_timing(&self) -> ClipboardTiming {
        ClipboardTiming {
            decoy_delay: Duration::from_millis(self.clipboard_decoy_ms),
            clear_after: Duration::from_secs(self.clipboard_clear_secs),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.vault_dir, ".encryptoor");
        assert_eq!(s.idle_timeout_secs, 600);
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.cooldown_secs, 900);
        assert_eq!(s.import_max_bytes, 52_428_800);
        assert_eq!(s.scrypt_params(), ScryptParams::default());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        let config = "scrypt_log_n = 10\nidle_timeout_secs = 5\n";
        fs::write(tmp.path().join(".encryptoor.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.scrypt_log_n, 10);
        assert_eq!(settings.idle_timeout(), Duration::from_secs(5));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.vault_dir, ".encryptoor");
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".encryptoor.toml"), "not valid {{toml").unwrap();

        let err = Settings::load(tmp.path()).unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn load_rejects_out_of_range_kdf_cost() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".encryptoor.toml"), "scrypt_log_n = 40\n").unwrap();

        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn paths_resolve_against_base() {
        let s = Settings {
            vault_dir: "secrets".to_string(),
            export_dir: "out".to_string(),
            ..Settings::default()
        };
        let p = s.paths(Path::new("/home/user"));
        assert_eq!(p.vault_dir, PathBuf::from("/home/user/secrets"));
        assert_eq!(p.vault_file, PathBuf::from("/home/user/secrets/vault.json"));
        assert_eq!(p.meta_file, PathBuf::from("/home/user/secrets/vault.meta.json"));
        assert_eq!(p.export_dir, PathBuf::from("/home/user/out"));
    }
}
