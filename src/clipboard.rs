//! Clipboard placement of secrets.
//!
//! A copy writes a decoy first, then the real secret after a short delay
//! (clipboard history tools tend to snapshot the first write), and clears
//! the clipboard after a fixed window only if it still holds exactly that
//! secret.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};

/// Placeholder written before the real secret.
pub const DECOY: &str = "\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}";

/// Minimal clipboard surface the engine needs.
pub trait Clipboard: Send + Sync {
    fn get_text(&self) -> Result<String>;
    fn set_text(&self, text: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// The system clipboard via `arboard`.
///
/// A fresh handle is opened per call so the type stays `Send + Sync`
/// on every platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

fn clipboard_err(e: arboard::Error) -> VaultError {
    VaultError::Unexpected(format!("clipboard: {e}"))
}

impl Clipboard for SystemClipboard {
    fn get_text(&self) -> Result<String> {
        arboard::Clipboard::new()
            .and_then(|mut c| c.get_text())
            .map_err(clipboard_err)
    }

    fn set_text(&self, text: &str) -> Result<()> {
        arboard::Clipboard::new()
            .and_then(|mut c| c.set_text(text))
            .map_err(clipboard_err)
    }

    fn clear(&self) -> Result<()> {
        arboard::Clipboard::new()
            .and_then(|mut c| c.clear())
            .map_err(clipboard_err)
    }
}

/// Delays used by [`ClipboardGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardTiming {
    /// How long the decoy stays before the real secret is written.
    pub decoy_delay: Duration,
    /// How long the secret stays before the conditional clear.
    pub clear_after: Duration,
}

impl Default for ClipboardTiming {
    fn default() -> Self {
        Self {
            decoy_delay: Duration::from_millis(200),
            clear_after: Duration::from_secs(30),
        }
    }
}

/// Schedules decoy, secret, and conditional clear for each copy.
///
/// A newer copy supersedes the pending steps of an older one.
pub struct ClipboardGuard {
    clipboard: Arc<dyn Clipboard>,
    timing: ClipboardTiming,
    generation: Arc<AtomicU64>,
}

impl ClipboardGuard {
    pub fn new(clipboard: Arc<dyn Clipboard>, timing: ClipboardTiming) -> Self {
        Self {
            clipboard,
            timing,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn timing(&self) -> ClipboardTiming {
        self.timing
    }

    /// Place `secret` on the clipboard using the decoy-then-real pattern.
    ///
    /// Returns the handle of the background thread that performs the
    /// delayed steps; it finishes once the clear window has passed.
    pub fn copy_secret(&self, secret: Zeroizing<String>) -> Result<JoinHandle<()>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.clipboard.set_text(DECOY)?;

        let clipboard = Arc::clone(&self.clipboard);
        let current = Arc::clone(&self.generation);
        let timing = self.timing;

        thread::Builder::new()
            .name("clipboard-guard".into())
            .spawn(move || {
                thread::sleep(timing.decoy_delay);
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                if let Err(e) = clipboard.set_text(&secret) {
                    tracing::warn!(error = %e, "failed to place secret on clipboard");
                    return;
                }

                thread::sleep(timing.clear_after);
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                let still_ours = clipboard
                    .get_text()
                    .map(|text| {
                        let text = Zeroizing::new(text);
                        bool::from(text.as_bytes().ct_eq(secret.as_bytes()))
                    })
                    .unwrap_or(false);
                if still_ours {
                    if let Err(e) = clipboard.clear() {
                        tracing::warn!(error = %e, "failed to clear clipboard");
                    } else {
                        tracing::debug!("clipboard cleared");
                    }
                }
            })
            .map_err(VaultError::Io)
    }
}

/// An in-process clipboard, useful for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: std::sync::Mutex<String>,
    writes: std::sync::Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value written so far, in order (clears record an empty string).
    pub fn history(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn contents(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&self) -> Result<String> {
        self.text
            .lock()
            .map(|t| t.clone())
            .map_err(|_| VaultError::Unexpected("clipboard lock poisoned".into()))
    }

    fn set_text(&self, text: &str) -> Result<()> {
        let mut current = self
            .text
            .lock()
            .map_err(|_| VaultError::Unexpected("clipboard lock poisoned".into()))?;
        *current = text.to_string();
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(text.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.set_text("")
    }
}
