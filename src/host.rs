//! Host-process integration: hardening, debugger detection, and the
//! hooks that lock the vault when the process is in trouble.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::errors::{Result, VaultError};
use crate::vault::engine::SharedEngine;
use crate::vault::session::LockReason;

/// Conditions reported by the host that must end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Crash,
    TerminatingSignal,
    Suspend,
    ScreenLocked,
    DebuggerAttached,
}

impl HostEvent {
    pub fn lock_reason(self) -> LockReason {
        match self {
            Self::Crash => LockReason::Crash,
            Self::TerminatingSignal => LockReason::Signal,
            Self::Suspend => LockReason::Suspend,
            Self::ScreenLocked => LockReason::ScreenLock,
            Self::DebuggerAttached => LockReason::Debugger,
        }
    }
}

/// Disable core dumps and, on Linux, mark the process non-dumpable so
/// key material cannot be read from a crash image or by `ptrace` peers.
#[cfg(unix)]
pub fn harden_process() -> Result<()> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, initialised rlimit for the duration of the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) } != 0 {
        return Err(VaultError::Io(std::io::Error::last_os_error()));
    }

    #[cfg(target_os = "linux")]
    {
        // SAFETY: PR_SET_DUMPABLE takes a single integer argument.
        if unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0) } != 0 {
            return Err(VaultError::Io(std::io::Error::last_os_error()));
        }
    }

    tracing::debug!("process hardened: core dumps disabled");
    Ok(())
}

#[cfg(not(unix))]
pub fn harden_process() -> Result<()> {
    Ok(())
}

/// True when a tracer is attached to this process.
#[cfg(target_os = "linux")]
pub fn debugger_attached() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .as_deref()
        .and_then(tracer_pid)
        .is_some_and(|pid| pid != 0)
}

#[cfg(not(target_os = "linux"))]
pub fn debugger_attached() -> bool {
    false
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Chain a panic hook that locks `engine` before the previous hook runs.
///
/// If the panicking thread holds the engine lock, the session is wiped
/// when the boundary later recovers the poisoned mutex.
pub fn install_crash_hook(engine: SharedEngine) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Ok(mut guard) = engine.try_lock() {
            guard.handle_host_event(HostEvent::Crash);
        }
        previous(info);
    }));
}

/// Background thread that expires idle sessions (and locks on debugger
/// attach when asked to) on behalf of a [`SharedEngine`].
pub struct IdleWatchdog {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IdleWatchdog {
    pub fn spawn(engine: SharedEngine, interval: Duration, lock_on_debugger: bool) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("vault-idle-watchdog".into())
            .spawn(move || {
                while !flag.load(Ordering::SeqCst) {
                    thread::park_timeout(interval);
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(mut guard) = engine.lock() else {
                        break;
                    };
                    if lock_on_debugger && guard.is_unlocked() && debugger_attached() {
                        guard.handle_host_event(HostEvent::DebuggerAttached);
                    }
                    guard.expire_idle();
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tracer_pid() {
        let status = "Name:\tencryptoor\nState:\tR\nTracerPid:\t4242\nUid:\t0\n";
        assert_eq!(tracer_pid(status), Some(4242));
        assert_eq!(tracer_pid("TracerPid:\t0\n"), Some(0));
        assert_eq!(tracer_pid("Name:\tx\n"), None);
    }

    #[test]
    fn events_map_to_reasons() {
        assert_eq!(HostEvent::TerminatingSignal.lock_reason(), LockReason::Signal);
        assert_eq!(HostEvent::DebuggerAttached.lock_reason(), LockReason::Debugger);
    }

    #[cfg(unix)]
    #[test]
    fn hardening_succeeds() {
        harden_process().unwrap();
    }
}
