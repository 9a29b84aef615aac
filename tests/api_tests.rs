//! Integration tests for the presentation boundary and host hooks.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use encryptoor::api::VaultApi;
use encryptoor::clipboard::MemoryClipboard;
use encryptoor::config::Settings;
use encryptoor::host::{install_crash_hook, IdleWatchdog};
use encryptoor::vault::{ImportSource, LockReason, OwnerRef, VaultEngine, VaultEvent};
use serde_json::json;
use tempfile::TempDir;

const PW: &str = "api test password";
const ME: OwnerRef = OwnerRef(7);

fn settings() -> Settings {
    Settings {
        scrypt_log_n: 10,
        clipboard_decoy_ms: 1,
        clipboard_clear_secs: 0,
        ..Settings::default()
    }
}

fn api_in(dir: &TempDir, settings: &Settings) -> VaultApi {
    let engine = VaultEngine::new(settings, dir.path())
        .with_clipboard(Arc::new(MemoryClipboard::new()))
        .into_shared();
    VaultApi::new(engine)
}

fn login(id: &str) -> serde_json::Value {
    json!({
        "type": "login", "id": id, "title": "Bank", "username": "me",
        "password": "s3cret", "website": "", "createdAt": 1, "updatedAt": 1
    })
}

#[test]
fn responses_carry_success_and_codes() {
    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    assert!(!api.init());

    let r = api.unlock(PW, ME);
    assert!(!r.success);
    assert_eq!(r.code, Some("NOT_INITIALIZED"));

    assert!(api.create_vault(PW, &[login("a")]).success);
    assert!(api.init());

    let r = api.create_vault(PW, &[]);
    assert_eq!(r.code, Some("ALREADY_INITIALIZED"));

    let r = api.unlock("wrong", ME);
    assert_eq!(r.code, Some("WRONG_PASSWORD"));
    assert_eq!(
        r.error.as_deref(),
        Some("Wrong password. Remaining attempts: 2")
    );

    let r = api.unlock(PW, ME);
    assert!(r.success);
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["data"][0]["password"], "\u{2022}".repeat(6));
    assert_eq!(json["data"][0]["type"], "login");
}

#[test]
fn reveal_and_copy_fail_silently() {
    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    api.create_vault(PW, &[login("a")]).check().unwrap();

    assert_eq!(api.reveal_secret(ME, "a"), "");
    assert!(api.copy_secret_to_clipboard(ME, "a").is_none());

    api.unlock(PW, ME).into_result().unwrap();
    assert_eq!(api.reveal_secret(ME, "a"), "s3cret");
    assert_eq!(api.reveal_secret(OwnerRef(8), "a"), "");
    assert_eq!(api.reveal_secret(ME, "missing"), "");

    let handle = api.copy_secret_to_clipboard(ME, "a").unwrap();
    handle.join().unwrap();
}

#[test]
fn import_report_shape() {
    let backup_dir = TempDir::new().unwrap();
    let backup = api_in(&backup_dir, &settings());
    backup
        .create_vault("backup password", &[login("b")])
        .check()
        .unwrap();
    let bytes = std::fs::read(backup_dir.path().join(".encryptoor/vault.json")).unwrap();

    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    api.create_vault(PW, &[]).check().unwrap();
    api.unlock(PW, ME).into_result().unwrap();

    let r = api.import_vault(ME, "backup password", ImportSource::Bytes(bytes));
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], json!({"new": 1, "skipped": 0}));
    assert_eq!(json["data"]["entries"].as_array().unwrap().len(), 1);
}

#[test]
fn lock_emits_event_to_subscribers() {
    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    api.create_vault(PW, &[]).check().unwrap();
    api.unlock(PW, ME).into_result().unwrap();
    let events = api.subscribe().unwrap();

    api.lock(LockReason::Suspend);
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        VaultEvent::Locked {
            reason: LockReason::Suspend
        }
    );
    assert_eq!(api.list(ME).code, Some("UNAUTHORIZED"));
}

#[test]
fn poisoned_engine_is_locked_and_recovers() {
    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    api.create_vault(PW, &[]).check().unwrap();
    api.unlock(PW, ME).into_result().unwrap();

    let engine = api.engine();
    let _ = thread::spawn(move || {
        let _guard = engine.lock().unwrap();
        panic!("simulated crash while holding the engine");
    })
    .join();

    let r = api.list(ME);
    assert_eq!(r.code, Some("UNEXPECTED"));

    // The poison is cleared and the session is gone.
    assert_eq!(api.list(ME).code, Some("UNAUTHORIZED"));
    assert!(api.unlock(PW, ME).success);
}

#[test]
fn watchdog_expires_idle_session() {
    let dir = TempDir::new().unwrap();
    let api = api_in(
        &dir,
        &Settings {
            idle_timeout_secs: 0,
            ..settings()
        },
    );
    api.create_vault(PW, &[]).check().unwrap();
    api.unlock(PW, ME).into_result().unwrap();
    let events = api.subscribe().unwrap();

    let watchdog = IdleWatchdog::spawn(api.engine(), Duration::from_millis(10), false).unwrap();
    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    watchdog.stop();

    assert_eq!(
        event,
        VaultEvent::Locked {
            reason: LockReason::Timeout
        }
    );
}

#[test]
fn crash_hook_locks_the_engine() {
    let dir = TempDir::new().unwrap();
    let api = api_in(&dir, &settings());
    api.create_vault(PW, &[]).check().unwrap();
    api.unlock(PW, ME).into_result().unwrap();
    let events = api.subscribe().unwrap();

    install_crash_hook(api.engine());
    let _ = std::panic::catch_unwind(|| panic!("boom"));

    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        VaultEvent::Locked {
            reason: LockReason::Crash
        }
    );
}
