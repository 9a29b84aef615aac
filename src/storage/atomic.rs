//! Crash-safe file replacement.
//!
//! Every write goes to a temporary sibling, is flushed to stable storage,
//! and is then renamed over the target so a reader never sees a
//! half-written file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::{Result, VaultError};

/// Number of rename attempts on platforms where the destination can be
/// transiently locked by another process (virus scanners, indexers).
#[cfg_attr(not(windows), allow(dead_code))]
const RENAME_RETRIES: u32 = 5;

/// Backoff step between rename attempts.
#[cfg_attr(not(windows), allow(dead_code))]
const RENAME_BACKOFF_MS: u64 = 50;

/// Something that can atomically replace a file's contents.
///
/// `FsWriter` is the production implementation; hosts and tests can
/// substitute their own to observe or fault writes.
pub trait AtomicWriter: Send + Sync {
    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Writes through the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl AtomicWriter for FsWriter {
    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        atomic_write(path, bytes)
    }
}

/// Write `bytes` to `path` atomically.
///
/// 1. Write to a temp file in the same directory (same filesystem, so the
///    rename is atomic).
/// 2. `fsync` the temp file.
/// 3. Rename it over the target.
/// 4. `fsync` the directory so the rename itself is durable (Unix).
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = temp_sibling(path);

    let result = write_synced(&tmp_path, bytes).and_then(|()| replace(&tmp_path, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(classify_io_error(e));
    }

    sync_parent_dir(path);
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "atomic write complete");
    Ok(())
}

/// Move an already-synced file over `to` and make the rename durable.
pub fn promote(from: &Path, to: &Path) -> Result<()> {
    replace(from, to).map_err(classify_io_error)?;
    sync_parent_dir(to);
    tracing::debug!(path = %to.display(), "staged file promoted");
    Ok(())
}

/// Map OS failures onto the storage error taxonomy.
///
/// Out-of-space becomes `DiskFull`, permission problems become
/// `PermissionDenied`, everything else is passed through untouched.
pub fn classify_io_error(err: io::Error) -> VaultError {
    if err.raw_os_error() == Some(libc::ENOSPC) {
        return VaultError::DiskFull;
    }
    #[cfg(windows)]
    {
        // ERROR_DISK_FULL / ERROR_HANDLE_DISK_FULL
        if matches!(err.raw_os_error(), Some(112) | Some(39)) {
            return VaultError::DiskFull;
        }
    }
    if err.kind() == io::ErrorKind::PermissionDenied {
        return VaultError::PermissionDenied;
    }
    VaultError::Io(err)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
    parent.join(format!(
        ".{}.{}.{nanos}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ))
}

fn write_synced(tmp_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(windows))]
fn replace(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Windows cannot always overwrite by rename: remove the destination and
/// retry while it is held open by someone else.
#[cfg(windows)]
fn replace(from: &Path, to: &Path) -> io::Result<()> {
    let mut attempt = 0;
    loop {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) if attempt + 1 < RENAME_RETRIES => {
                tracing::debug!(attempt, error = %e, "rename blocked, retrying");
                if to.exists() {
                    let _ = fs::remove_file(to);
                }
                attempt += 1;
                std::thread::sleep(std::time::Duration::from_millis(
                    RENAME_BACKOFF_MS * u64::from(attempt),
                ));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
