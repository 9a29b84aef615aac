//! Generational backups of the vault file.
//!
//! Before every write the previous generations shift down one slot
//! (`.bak2 -> .bak3`, `.bak1 -> .bak2`, the old `.bak3` is dropped) and the
//! current primary is copied into `.bak1`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::storage::atomic::classify_io_error;

/// Number of prior generations kept next to the primary file.
pub const GENERATIONS: usize = 3;

/// Path of backup generation `index` (1-based) for `primary`.
pub fn backup_path(primary: &Path, index: usize) -> PathBuf {
    let mut name = primary.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".bak{index}"));
    primary.with_file_name(name)
}

/// Shift every existing generation one slot older, dropping the oldest.
pub fn rotate_backups(primary: &Path) -> Result<()> {
    let oldest = backup_path(primary, GENERATIONS);
    if oldest.exists() {
        fs::remove_file(&oldest).map_err(classify_io_error)?;
    }

    for index in (1..GENERATIONS).rev() {
        let src = backup_path(primary, index);
        if src.exists() {
            let dest = backup_path(primary, index + 1);
            fs::rename(&src, &dest).map_err(classify_io_error)?;
        }
    }

    Ok(())
}

/// Copy the current primary file into generation 1, if it exists.
pub fn snapshot_primary(primary: &Path) -> Result<()> {
    if primary.exists() {
        fs::copy(primary, backup_path(primary, 1)).map_err(classify_io_error)?;
        tracing::debug!(path = %primary.display(), "snapshotted vault into .bak1");
    }
    Ok(())
}

/// Paths of every backup generation that currently exists, newest first.
pub fn existing_backups(primary: &Path) -> Vec<PathBuf> {
    (1..=GENERATIONS)
        .map(|i| backup_path(primary, i))
        .filter(|p| p.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn backup_path_appends_generation() {
        let p = Path::new("/data/vault.json");
        assert_eq!(backup_path(p, 2), PathBuf::from("/data/vault.json.bak2"));
    }

    #[test]
    fn rotation_keeps_three_generations() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("vault.json");

        for gen in 1..=5 {
            rotate_backups(&primary).unwrap();
            snapshot_primary(&primary).unwrap();
            fs::write(&primary, format!("gen{gen}")).unwrap();
        }

        // Primary holds gen5; backups hold gen4, gen3, gen2.
        assert_eq!(fs::read_to_string(&primary).unwrap(), "gen5");
        assert_eq!(
            fs::read_to_string(backup_path(&primary, 1)).unwrap(),
            "gen4"
        );
        assert_eq!(
            fs::read_to_string(backup_path(&primary, 2)).unwrap(),
            "gen3"
        );
        assert_eq!(
            fs::read_to_string(backup_path(&primary, 3)).unwrap(),
            "gen2"
        );
        assert!(!backup_path(&primary, 4).exists());
        assert_eq!(existing_backups(&primary).len(), 3);
    }

    #[test]
    fn snapshot_without_primary_is_noop() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("vault.json");
        snapshot_primary(&primary).unwrap();
        assert!(existing_backups(&primary).is_empty());
    }
}
