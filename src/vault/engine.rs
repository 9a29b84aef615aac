//! `VaultEngine`: the high-level handle that owns the on-disk vault, the
//! lockout policy, and the single unlocked session.
//!
//! Every mutation follows the same pipeline: clone the working set, apply
//! the change, re-encrypt the whole set under the vault key, write it
//! through the durable store, and only then commit it to the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::clipboard::{Clipboard, ClipboardGuard, SystemClipboard};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::crypto::{ScryptParams, SecretKey};
use crate::errors::{Result, VaultError};
use crate::host::HostEvent;
use crate::storage::{classify_io_error, AtomicWriter, DurableStore};
use crate::vault::entry::{mask_entries, sanitize, Entry};
use crate::vault::format::{decode_payload, encode_payload, VaultFile};
use crate::vault::lockout::RateLimiter;
use crate::vault::merge::{merge_entries, ImportStatus};
use crate::vault::session::{LockReason, OwnerRef, Session, VaultEvent};

/// An engine shared between the boundary, watchdog and crash hook.
pub type SharedEngine = Arc<Mutex<VaultEngine>>;

/// Where an imported vault comes from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub status: ImportStatus,
    /// The merged working set, masked.
    pub entries: Vec<Entry>,
}

pub struct VaultEngine {
    store: DurableStore,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    kdf_params: ScryptParams,
    idle_timeout: Duration,
    import_max_bytes: u64,
    export_dir: PathBuf,
    clipboard: ClipboardGuard,
    session: Option<Session>,
    subscribers: Vec<Sender<VaultEvent>>,
}

impl VaultEngine {
    /// Build an engine for the vault described by `settings` under `base_dir`.
    pub fn new(settings: &Settings, base_dir: &Path) -> Self {
        let paths = settings.paths(base_dir);
        Self {
            store: DurableStore::new(paths.vault_dir, paths.vault_file, paths.meta_file),
            limiter: RateLimiter::new(settings.max_attempts, settings.cooldown()),
            clock: Arc::new(SystemClock),
            kdf_params: settings.scrypt_params(),
            idle_timeout: settings.idle_timeout(),
            import_max_bytes: settings.import_max_bytes,
            export_dir: paths.export_dir,
            clipboard: ClipboardGuard::new(Arc::new(SystemClipboard), settings.clipboard_timing()),
            session: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn AtomicWriter>) -> Self {
        self.store = self.store.with_writer(writer);
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        let timing = self.clipboard.timing();
        self.clipboard = ClipboardGuard::new(clipboard, timing);
        self
    }

    /// Wrap the engine for sharing across threads.
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// True when a valid vault (or a recoverable backup) exists.
    pub fn is_initialized(&self) -> bool {
        self.store.read_vault().is_ok()
    }

    /// Create a new vault protected by `password` and seeded with `entries`.
    pub fn create_vault(&mut self, password: &str, entries: &[Value]) -> Result<()> {
        if password.is_empty() {
            return Err(VaultError::InvalidInput("password must not be empty".into()));
        }
        if self.store.has_vault_files() {
            return Err(VaultError::AlreadyInitialized);
        }

        let mut initial = entries.iter().map(sanitize).collect::<Result<Vec<_>>>()?;
        let payload = encode_payload(&initial);
        wipe(&mut initial);
        let payload = payload?;

        let vault_key = SecretKey::generate();
        let vault = VaultFile::seal(
            password.as_bytes(),
            &vault_key,
            &payload,
            &self.kdf_params,
            self.clock.now_ms(),
        )?;

        self.store.ensure_vault_dir()?;
        self.store.write_vault(&vault)?;
        self.limiter.initialize(&self.store)?;

        tracing::info!(
            path = %self.store.vault_file().display(),
            entries = entries.len(),
            "vault created"
        );
        Ok(())
    }

    /// Verify `password`, open the payload, and start a session for `owner`.
    ///
    /// Returns the masked entry set.
    pub fn unlock(&mut self, password: &str, owner: OwnerRef) -> Result<Vec<Entry>> {
        let vault = self.store.read_vault()?;
        let vault_key = self.verify_password(&vault, password)?;
        let payload = vault.open_payload(&vault_key)?;
        let entries: Vec<Entry> = decode_payload(&payload)?;

        if self.session.is_some() {
            self.teardown(LockReason::Replaced);
        }

        let masked = mask_entries(&entries);
        let session = Session::new(vault_key, entries, owner, self.idle_timeout);
        tracing::info!(session = %session.id(), owner = owner.0, "vault unlocked");
        self.session = Some(session);
        Ok(masked)
    }

    /// Tear down the session, if any.
    pub fn lock(&mut self, reason: LockReason) {
        self.teardown(reason);
    }

    /// Wrap the vault key under `new_password` after checking `old_password`.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(VaultError::InvalidInput("new password must not be empty".into()));
        }

        let mut vault = self.store.read_vault()?;
        let vault_key = self.verify_password(&vault, old_password)?;
        vault.rewrap(&vault_key, new_password.as_bytes(), &self.kdf_params)?;
        self.store.write_vault(&vault)?;

        tracing::info!("vault password changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(Session::id)
    }

    /// Register a listener for lock notifications.
    pub fn subscribe(&mut self) -> Receiver<VaultEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Lock the session if its idle deadline has passed. Returns whether
    /// a session was torn down.
    pub fn expire_idle(&mut self) -> bool {
        let expired = self
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(Instant::now()));
        if expired {
            self.teardown(LockReason::Timeout);
        }
        expired
    }

    /// React to a host-process condition that must not leave secrets in memory.
    pub fn handle_host_event(&mut self, event: HostEvent) {
        self.teardown(event.lock_reason());
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// The masked working set.
    pub fn list(&mut self, owner: OwnerRef) -> Result<Vec<Entry>> {
        self.require_session(owner)?;
        Ok(mask_entries(self.session_ref()?.entries()))
    }

    /// Insert a new entry or replace the one with the same id.
    pub fn upsert(&mut self, owner: OwnerRef, input: &Value) -> Result<Vec<Entry>> {
        self.require_session(owner)?;
        let entry = sanitize(input)?;

        let mut next = self.session_ref()?.entries().to_vec();
        match next.iter_mut().find(|e| e.id() == entry.id()) {
            Some(slot) => {
                let mut old = std::mem::replace(slot, entry);
                old.zeroize();
            }
            None => next.push(entry),
        }

        self.persist_entries(next)
    }

    /// Remove the entry with `id`. Unknown ids leave the set unchanged.
    pub fn remove(&mut self, owner: OwnerRef, id: &str) -> Result<Vec<Entry>> {
        self.require_session(owner)?;

        let next: Vec<Entry> = self
            .session_ref()?
            .entries()
            .iter()
            .filter(|e| e.id() != id)
            .cloned()
            .collect();

        self.persist_entries(next)
    }

    /// The unmasked secret of one entry.
    pub fn reveal_secret(&mut self, owner: OwnerRef, id: &str) -> Result<Zeroizing<String>> {
        self.require_session(owner)?;
        self.session_ref()?
            .find(id)
            .and_then(Entry::secret)
            .map(|s| Zeroizing::new(s.to_string()))
            .ok_or_else(|| VaultError::InvalidInput(format!("no secret for entry '{id}'")))
    }

    /// Place a login's password on the clipboard using the decoy pattern.
    ///
    /// Returns `None` when the entry has no password to copy.
    pub fn copy_secret_to_clipboard(
        &mut self,
        owner: OwnerRef,
        id: &str,
    ) -> Result<Option<JoinHandle<()>>> {
        self.require_session(owner)?;
        let secret = match self.session_ref()?.find(id).and_then(Entry::secret) {
            Some(s) if !s.is_empty() => Zeroizing::new(s.to_string()),
            _ => return Ok(None),
        };
        self.clipboard.copy_secret(secret).map(Some)
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Write the working set to a standalone vault file under the export
    /// directory and return its path.
    ///
    /// With `use_old_pass`, the export keeps the current vault key and
    /// password. Otherwise it is sealed under a fresh vault key and
    /// `new_pass`. The current password is verified either way.
    pub fn export_vault(
        &mut self,
        owner: OwnerRef,
        use_old_pass: bool,
        current_pass: &str,
        new_pass: Option<&str>,
    ) -> Result<PathBuf> {
        self.require_session(owner)?;

        let new_pass = new_pass.filter(|p| !p.is_empty());
        if current_pass.is_empty() || use_old_pass == new_pass.is_some() {
            return Err(VaultError::InvalidInput("Bad params".into()));
        }
        let export_dir = self.resolve_export_dir()?;

        let mut vault = self.store.read_vault()?;
        drop(self.verify_password(&vault, current_pass)?);

        let now = self.clock.now_ms();
        let session = self.session_ref()?;
        let payload = encode_payload(&session.entries())?;

        let exported = match new_pass {
            None => {
                vault.replace_payload(session.vault_key(), &payload, now)?;
                vault.header.created_at = now;
                vault
            }
            Some(pass) => VaultFile::seal(
                pass.as_bytes(),
                &SecretKey::generate(),
                &payload,
                &self.kdf_params,
                now,
            )?,
        };

        let path = export_dir.join(export_file_name(now));
        self.store.write_file(&path, &exported.to_bytes()?)?;

        tracing::info!(path = %path.display(), rekeyed = !use_old_pass, "vault exported");
        Ok(path)
    }

    /// Merge a foreign vault, protected by its own `password`, into the
    /// working set without overwriting anything.
    pub fn import_vault(
        &mut self,
        owner: OwnerRef,
        password: &str,
        source: ImportSource,
    ) -> Result<ImportOutcome> {
        self.require_session(owner)?;
        if password.is_empty() {
            return Err(VaultError::InvalidInput("Bad params".into()));
        }

        let bytes = read_import_source(source, self.import_max_bytes)?;
        let foreign = VaultFile::from_slice(&bytes)?;
        let foreign_key = foreign
            .unwrap_vault_key(password.as_bytes())
            .map_err(|e| match e {
                VaultError::DecryptionFailed => {
                    VaultError::WrongPassword("Check the backup's password.".into())
                }
                other => other,
            })?;
        let payload = foreign.open_payload(&foreign_key)?;
        let mut incoming: Vec<Value> = decode_payload(&payload)?;

        let (merged, status) = merge_entries(self.session_ref()?.entries(), &incoming);
        incoming.iter_mut().for_each(wipe_value);

        let entries = self.persist_entries(merged)?;
        tracing::info!(new = status.new, skipped = status.skipped, "vault imported");
        Ok(ImportOutcome { status, entries })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Gate for every sensitive call. An expired session is torn down; an
    /// owner mismatch is refused without sliding the idle deadline.
    fn require_session(&mut self, owner: OwnerRef) -> Result<()> {
        let (expired, owned) = match self.session.as_ref() {
            None => return Err(VaultError::Unauthorized),
            Some(s) => (s.is_expired(Instant::now()), s.owner() == owner),
        };

        if expired {
            self.teardown(LockReason::Timeout);
            return Err(VaultError::Unauthorized);
        }
        if !owned {
            tracing::warn!(owner = owner.0, "session access from a different owner refused");
            return Err(VaultError::Unauthorized);
        }

        if let Some(s) = self.session.as_mut() {
            s.touch();
        }
        Ok(())
    }

    /// Create the export directory and refuse it when it resolves to the
    /// vault directory or anywhere below it.
    fn resolve_export_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir).map_err(classify_io_error)?;
        let export_dir = fs::canonicalize(&self.export_dir).map_err(classify_io_error)?;
        let vault_dir = fs::canonicalize(self.store.vault_dir()).map_err(classify_io_error)?;
        if export_dir.starts_with(&vault_dir) {
            return Err(VaultError::InvalidInput(
                "export directory must be outside the vault directory".into(),
            ));
        }
        Ok(export_dir)
    }

    fn session_ref(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(VaultError::Unauthorized)
    }

    /// Rate-limited password check against `vault`; returns the vault key.
    fn verify_password(&mut self, vault: &VaultFile, password: &str) -> Result<SecretKey> {
        let now = self.clock.now_ms();
        let mut meta = self.limiter.load(&self.store, now)?;
        self.limiter.check(&self.store, &mut meta, now)?;

        match vault.unwrap_vault_key(password.as_bytes()) {
            Ok(key) => {
                self.limiter.record_success(&self.store, &mut meta)?;
                Ok(key)
            }
            Err(VaultError::DecryptionFailed) => {
                let err = self.limiter.record_failure(&self.store, &mut meta, now)?;
                if self.limiter.is_exhausted(&meta) {
                    self.teardown(LockReason::MaxAttempts);
                }
                Err(err)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-encrypt `entries`, write them durably, then commit them to the
    /// session. On failure the session keeps its previous set.
    fn persist_entries(&mut self, mut entries: Vec<Entry>) -> Result<Vec<Entry>> {
        if let Err(e) = self.write_entries(&entries) {
            wipe(&mut entries);
            return Err(e);
        }

        let masked = mask_entries(&entries);
        match self.session.as_mut() {
            Some(s) => s.commit_entries(entries),
            None => wipe(&mut entries),
        }
        Ok(masked)
    }

    fn write_entries(&self, entries: &[Entry]) -> Result<()> {
        let session = self.session_ref()?;
        let payload = encode_payload(&entries)?;
        let mut vault = self.store.read_vault()?;
        vault.replace_payload(session.vault_key(), &payload, self.clock.now_ms())?;
        self.store.write_vault(&vault)?;
        tracing::debug!(entries = entries.len(), "vault payload written");
        Ok(())
    }

    fn teardown(&mut self, reason: LockReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.wipe();
        tracing::info!(session = %session.id(), %reason, "vault locked");
        drop(session);

        self.subscribers
            .retain(|tx| tx.send(VaultEvent::Locked { reason }).is_ok());
    }
}

/// `vault_backup_<YYYY-MM-DD>_<HH-MM-SS>.json`, in local time.
fn export_file_name(now_ms: i64) -> String {
    let stamp = chrono::DateTime::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .with_timezone(&chrono::Local);
    stamp.format("vault_backup_%Y-%m-%d_%H-%M-%S.json").to_string()
}

fn read_import_source(source: ImportSource, max_bytes: u64) -> Result<Vec<u8>> {
    let too_large = || VaultError::InvalidInput("Vault file too large".into());
    match source {
        ImportSource::Bytes(bytes) => {
            if bytes.len() as u64 > max_bytes {
                return Err(too_large());
            }
            Ok(bytes)
        }
        ImportSource::Path(path) => {
            let meta = fs::metadata(&path)
                .map_err(|_| VaultError::InvalidInput("File does not exist".into()))?;
            if !meta.is_file() {
                return Err(VaultError::InvalidInput("Invalid file".into()));
            }
            if meta.len() > max_bytes {
                return Err(too_large());
            }
            Ok(fs::read(&path)?)
        }
    }
}

fn wipe(entries: &mut Vec<Entry>) {
    entries.iter_mut().for_each(Zeroize::zeroize);
    entries.clear();
}

/// Zero every string inside an untrusted JSON value.
fn wipe_value(value: &mut Value) {
    match value {
        Value::String(s) => s.zeroize(),
        Value::Array(items) => items.iter_mut().for_each(wipe_value),
        Value::Object(map) => map.values_mut().for_each(wipe_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings {
            scrypt_log_n: 10,
            ..Settings::default()
        }
    }

    fn login(id: &str) -> Value {
        json!({
            "type": "login", "id": id, "title": "Mail", "username": "me",
            "password": "pw-123", "website": "", "createdAt": 1, "updatedAt": 1
        })
    }

    fn engine(dir: &TempDir) -> VaultEngine {
        VaultEngine::new(&settings(), dir.path()).with_clock(Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn create_refuses_existing_vault() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("correct horse", &[]).unwrap();
        assert!(matches!(
            e.create_vault("other", &[]),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn create_rejects_invalid_seed_entries() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        let err = e.create_vault("pw", &[json!({"id": "x"})]).unwrap_err();
        assert!(matches!(err, VaultError::InvalidEntry(_)));
        assert!(!e.is_initialized());
    }

    #[test]
    fn unlock_masks_and_reveal_unmasks() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("pw", &[login("a")]).unwrap();

        let listed = e.unlock("pw", OwnerRef(1)).unwrap();
        assert_eq!(listed[0].secret(), Some("\u{2022}".repeat(6).as_str()));
        assert_eq!(e.reveal_secret(OwnerRef(1), "a").unwrap().as_str(), "pw-123");
    }

    #[test]
    fn second_unlock_replaces_session() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("pw", &[]).unwrap();
        let events = e.subscribe();

        e.unlock("pw", OwnerRef(1)).unwrap();
        let first = e.session_id();
        e.unlock("pw", OwnerRef(2)).unwrap();

        assert_ne!(e.session_id(), first);
        assert_eq!(
            events.try_recv().unwrap(),
            VaultEvent::Locked {
                reason: LockReason::Replaced
            }
        );
        assert!(matches!(e.list(OwnerRef(1)), Err(VaultError::Unauthorized)));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("pw", &[login("a"), login("b")]).unwrap();
        e.unlock("pw", OwnerRef(1)).unwrap();

        let mut changed = login("a");
        changed["title"] = json!("Renamed");
        let listed = e.upsert(OwnerRef(1), &changed).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title(), "Renamed");
        assert_eq!(listed[1].id(), "b");
    }

    #[test]
    fn export_rejects_bad_param_combinations() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("pw", &[]).unwrap();
        e.unlock("pw", OwnerRef(1)).unwrap();

        for (use_old, new_pass) in [(true, Some("x")), (false, None), (false, Some(""))] {
            let err = e
                .export_vault(OwnerRef(1), use_old, "pw", new_pass)
                .unwrap_err();
            assert!(matches!(err, VaultError::InvalidInput(_)));
        }
    }

    #[test]
    fn export_file_name_shape() {
        let name = export_file_name(0);
        assert!(name.starts_with("vault_backup_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "vault_backup_1970-01-01_00-00-00.json".len());
    }

    #[test]
    fn import_size_cap_applies_to_bytes() {
        let err = read_import_source(ImportSource::Bytes(vec![0; 11]), 10).unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn import_missing_path_is_invalid_input() {
        let dir = TempDir::new().unwrap();
        let err =
            read_import_source(ImportSource::Path(dir.path().join("nope.json")), 10).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: File does not exist");

        let err = read_import_source(ImportSource::Path(dir.path().to_path_buf()), 10).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Invalid file");
    }

    #[test]
    fn wipe_value_zeroes_nested_strings() {
        let mut v = json!({"a": ["secret", {"b": "also"}], "n": 3});
        wipe_value(&mut v);
        assert_eq!(v, json!({"a": ["", {"b": ""}], "n": 3}));
    }

    #[test]
    fn host_event_locks() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(&dir);
        e.create_vault("pw", &[]).unwrap();
        e.unlock("pw", OwnerRef(1)).unwrap();
        let events = e.subscribe();

        e.handle_host_event(HostEvent::ScreenLocked);
        assert!(!e.is_unlocked());
        assert_eq!(
            events.recv().unwrap(),
            VaultEvent::Locked {
                reason: LockReason::ScreenLock
            }
        );
    }
}
