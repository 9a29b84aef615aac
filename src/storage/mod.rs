//! Durable storage for the vault and lockout files.
//!
//! This module provides:
//! - Atomic write-fsync-rename (`atomic`)
//! - Three-generation backup rotation (`backup`)
//! - `DurableStore`, which reads the vault with backup recovery and writes
//!   it through the rotation + atomic path

pub mod atomic;
pub mod backup;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use atomic::{atomic_write, classify_io_error, promote, AtomicWriter, FsWriter};

use crate::errors::{Result, VaultError};
use crate::vault::format::VaultFile;

/// Owns the on-disk vault file, its backups, and the lockout metadata.
pub struct DurableStore {
    vault_dir: PathBuf,
    vault_file: PathBuf,
    meta_file: PathBuf,
    writer: Arc<dyn AtomicWriter>,
}

impl DurableStore {
    pub fn new(vault_dir: PathBuf, vault_file: PathBuf, meta_file: PathBuf) -> Self {
        Self {
            vault_dir,
            vault_file,
            meta_file,
            writer: Arc::new(FsWriter),
        }
    }

    /// Replace the writer used for every atomic write.
    pub fn with_writer(mut self, writer: Arc<dyn AtomicWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    pub fn vault_file(&self) -> &Path {
        &self.vault_file
    }

    pub fn meta_file(&self) -> &Path {
        &self.meta_file
    }

    /// Atomically write arbitrary bytes through the configured writer.
    pub fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.writer.atomic_write(path, bytes)
    }

    /// Create the vault directory with owner-only permissions.
    pub fn ensure_vault_dir(&self) -> Result<()> {
        if !self.vault_dir.exists() {
            fs::create_dir_all(&self.vault_dir).map_err(classify_io_error)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.vault_dir, fs::Permissions::from_mode(0o700))
                .map_err(classify_io_error)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Vault file
    // ------------------------------------------------------------------

    /// Read and validate the vault, falling back to backups.
    ///
    /// On any parse/validation failure of the primary file, generations
    /// 1..3 are tried in order; the first valid one is atomically restored
    /// as the primary and returned. If none validates, the primary's
    /// original error is returned.
    pub fn read_vault(&self) -> Result<VaultFile> {
        if !self.vault_dir.exists() {
            return Err(VaultError::NotInitialized);
        }

        let primary_err = match read_validated(&self.vault_file) {
            Ok((vault, _)) => return Ok(vault),
            Err(e) => e,
        };

        tracing::warn!(
            path = %self.vault_file.display(),
            error = %primary_err,
            "primary vault unreadable, trying backups"
        );

        for backup in backup::existing_backups(&self.vault_file) {
            match read_validated(&backup) {
                Ok((vault, bytes)) => {
                    self.writer.atomic_write(&self.vault_file, &bytes)?;
                    tracing::info!(from = %backup.display(), "restored vault from backup");
                    return Ok(vault);
                }
                Err(e) => {
                    tracing::warn!(path = %backup.display(), error = %e, "backup is not usable");
                }
            }
        }

        Err(primary_err)
    }

    /// Write the new vault.
    ///
    /// The bytes are first written and synced to a staging sibling; the
    /// backup generations only rotate once that has succeeded, and the
    /// staged file is then renamed over the primary. A failed staging
    /// write leaves the primary and every backup untouched.
    pub fn write_vault(&self, vault: &VaultFile) -> Result<()> {
        let bytes = vault.to_bytes()?;
        let staged = staging_path(&self.vault_file);
        self.writer.atomic_write(&staged, &bytes)?;

        let committed = backup::rotate_backups(&self.vault_file)
            .and_then(|()| backup::snapshot_primary(&self.vault_file))
            .and_then(|()| promote(&staged, &self.vault_file));
        if committed.is_err() {
            let _ = fs::remove_file(&staged);
        }
        committed
    }

    /// True when a primary or any backup generation is present.
    pub fn has_vault_files(&self) -> bool {
        self.vault_file.exists() || !backup::existing_backups(&self.vault_file).is_empty()
    }

    // ------------------------------------------------------------------
    // Lockout metadata
    // ------------------------------------------------------------------

    /// Raw lockout metadata bytes.
    pub fn read_meta(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.meta_file)
    }

    pub fn write_meta(&self, bytes: &[u8]) -> Result<()> {
        self.writer.atomic_write(&self.meta_file, bytes)
    }
}

/// `.<file>.staged` next to the primary.
fn staging_path(primary: &Path) -> PathBuf {
    let name = primary.file_name().unwrap_or_default().to_string_lossy();
    primary.with_file_name(format!(".{name}.staged"))
}

fn read_validated(path: &Path) -> Result<(VaultFile, Vec<u8>)> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::NotInitialized,
        _ => classify_io_error(e),
    })?;
    let vault = VaultFile::from_slice(&bytes)?;
    Ok((vault, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ScryptParams, SecretKey};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DurableStore {
        let vault_dir = dir.path().join("vault");
        DurableStore::new(
            vault_dir.clone(),
            vault_dir.join("vault.json"),
            vault_dir.join("vault.meta.json"),
        )
    }

    fn vault_at(ts: i64) -> VaultFile {
        let key = SecretKey::generate();
        VaultFile::seal(b"pw", &key, b"[]", &ScryptParams::from_log_n(10, 8, 1), ts).unwrap()
    }

    #[test]
    fn read_without_directory_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            store(&dir).read_vault(),
            Err(VaultError::NotInitialized)
        ));
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();
        let v = vault_at(1);
        s.write_vault(&v).unwrap();
        assert_eq!(s.read_vault().unwrap(), v);
    }

    #[test]
    fn write_leaves_no_staged_file() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();
        s.write_vault(&vault_at(1)).unwrap();
        s.write_vault(&vault_at(2)).unwrap();

        assert!(!staging_path(s.vault_file()).exists());
        assert_eq!(backup::existing_backups(s.vault_file()).len(), 1);
    }

    #[test]
    fn corrupt_primary_recovers_from_newest_valid_backup() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();

        let v1 = vault_at(1);
        let v2 = vault_at(2);
        s.write_vault(&v1).unwrap();
        s.write_vault(&v2).unwrap();

        fs::write(s.vault_file(), b"{ corrupted").unwrap();
        let recovered = s.read_vault().unwrap();
        assert_eq!(recovered, v1);

        // The primary was restored on disk.
        let on_disk = VaultFile::from_slice(&fs::read(s.vault_file()).unwrap()).unwrap();
        assert_eq!(on_disk, v1);
    }

    #[test]
    fn skips_invalid_backup_generations() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();

        let v1 = vault_at(1);
        s.write_vault(&v1).unwrap();
        s.write_vault(&vault_at(2)).unwrap();
        s.write_vault(&vault_at(3)).unwrap();

        // bak1 = v2 (corrupted below), bak2 = v1.
        fs::write(backup::backup_path(s.vault_file(), 1), b"nope").unwrap();
        fs::write(s.vault_file(), b"nope").unwrap();

        assert_eq!(s.read_vault().unwrap(), v1);
    }

    #[test]
    fn all_generations_corrupt_returns_primary_error() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();
        s.write_vault(&vault_at(1)).unwrap();
        s.write_vault(&vault_at(2)).unwrap();

        fs::write(s.vault_file(), b"bad").unwrap();
        fs::write(backup::backup_path(s.vault_file(), 1), b"bad").unwrap();

        assert!(matches!(s.read_vault(), Err(VaultError::InvalidVault(_))));
    }

    #[test]
    fn missing_primary_without_backups_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();
        assert!(matches!(s.read_vault(), Err(VaultError::NotInitialized)));
        assert!(!s.has_vault_files());
    }

    #[cfg(unix)]
    #[test]
    fn vault_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.ensure_vault_dir().unwrap();
        let mode = fs::metadata(s.vault_dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
