//! The single in-memory unlocked session.
//!
//! A [`Session`] is the only place plaintext secrets live: the raw vault
//! key and the decrypted entry set. Dropping it wipes both.

use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;
use zeroize::Zeroize;

use crate::crypto::SecretKey;
use crate::vault::entry::Entry;

/// Identity of the caller that unlocked the vault (a window, a process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerRef(pub u64);

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    /// Explicit lock request.
    User,
    /// Idle deadline passed.
    Timeout,
    /// Too many wrong passwords.
    MaxAttempts,
    /// A new unlock replaced the previous session.
    Replaced,
    /// The host process is crashing.
    Crash,
    /// A terminating signal was received.
    Signal,
    /// The machine is going to sleep.
    Suspend,
    /// The screen was locked.
    ScreenLock,
    /// A debugger attached to the process.
    Debugger,
}

impl LockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Timeout => "timeout",
            Self::MaxAttempts => "max-attempts",
            Self::Replaced => "replaced",
            Self::Crash => "crash",
            Self::Signal => "signal",
            Self::Suspend => "suspend",
            Self::ScreenLock => "screen-lock",
            Self::Debugger => "debugger",
        }
    }
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications emitted to collaborators such as the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEvent {
    Locked { reason: LockReason },
}

pub struct Session {
    id: Uuid,
    vault_key: SecretKey,
    entries: Vec<Entry>,
    owner: OwnerRef,
    idle_timeout: Duration,
    deadline: Instant,
}

impl Session {
    pub fn new(
        vault_key: SecretKey,
        entries: Vec<Entry>,
        owner: OwnerRef,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vault_key,
            entries,
            owner,
            idle_timeout,
            deadline: Instant::now() + idle_timeout,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    pub fn vault_key(&self) -> &SecretKey {
        &self.vault_key
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Swap in a new working set, wiping the previous one.
    pub fn commit_entries(&mut self, entries: Vec<Entry>) {
        let mut old = std::mem::replace(&mut self.entries, entries);
        wipe_entries(&mut old);
    }

    /// Slide the idle deadline forward.
    pub fn touch(&mut self) {
        self.deadline = Instant::now() + self.idle_timeout;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Zero the key and the working set.
    pub fn wipe(&mut self) {
        self.vault_key.zeroize();
        wipe_entries(&mut self.entries);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

fn wipe_entries(entries: &mut Vec<Entry>) {
    entries.iter_mut().for_each(Zeroize::zeroize);
    entries.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::entry::NoteEntry;

    fn note(id: &str) -> Entry {
        Entry::Note(NoteEntry {
            id: id.into(),
            title: "t".into(),
            note: "secret".into(),
            created_at: 1,
            updated_at: 1,
        })
    }

    #[test]
    fn wipe_zeroes_key_and_entries() {
        let mut s = Session::new(
            SecretKey::generate(),
            vec![note("a")],
            OwnerRef(1),
            Duration::from_secs(60),
        );
        s.wipe();
        assert_eq!(s.vault_key().as_bytes(), &[0u8; 32]);
        assert!(s.entries().is_empty());
    }

    #[test]
    fn expiry_follows_deadline() {
        let mut s = Session::new(
            SecretKey::generate(),
            vec![],
            OwnerRef(1),
            Duration::from_millis(10),
        );
        assert!(!s.is_expired(Instant::now()));
        assert!(s.is_expired(Instant::now() + Duration::from_millis(20)));

        let before = s.deadline();
        std::thread::sleep(Duration::from_millis(2));
        s.touch();
        assert!(s.deadline() > before);
    }

    #[test]
    fn commit_replaces_entries() {
        let mut s = Session::new(
            SecretKey::generate(),
            vec![note("a")],
            OwnerRef(1),
            Duration::from_secs(60),
        );
        s.commit_entries(vec![note("b"), note("c")]);
        assert!(s.find("a").is_none());
        assert!(s.find("b").is_some());
        assert_eq!(s.entries().len(), 2);
    }

    #[test]
    fn debug_hides_contents() {
        let s = Session::new(
            SecretKey::generate(),
            vec![note("a")],
            OwnerRef(7),
            Duration::from_secs(60),
        );
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("OwnerRef(7)"));
    }

    #[test]
    fn reason_names() {
        assert_eq!(LockReason::MaxAttempts.to_string(), "max-attempts");
        assert_eq!(LockReason::ScreenLock.as_str(), "screen-lock");
    }
}
