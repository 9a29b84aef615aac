//! The presentation boundary.
//!
//! [`VaultApi`] is the only surface an untrusted UI or IPC layer should
//! touch. Every call takes the shared engine lock for its whole duration
//! and converts the internal `Result` into a [`Response`] exactly once.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::MutexGuard;
use std::thread::JoinHandle;

use serde::Serialize;
use serde_json::Value;

use crate::errors::{Result, VaultError};
use crate::vault::engine::{ImportSource, SharedEngine, VaultEngine};
use crate::vault::entry::Entry;
use crate::vault::merge::ImportStatus;
use crate::vault::session::{LockReason, OwnerRef, VaultEvent};

/// `{ success, error?, code?, data? }` as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Response<T> {
    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                error: None,
                code: None,
                data: Some(data),
            },
            Err(e) => {
                tracing::debug!(code = e.code(), "operation failed");
                Self {
                    success: false,
                    error: Some(e.to_string()),
                    code: Some(e.code()),
                    data: None,
                }
            }
        }
    }

    /// Back into a `Result`, for hosts that prefer `?`.
    pub fn into_result(self) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (success, _) => Err(Self::failure(success, self.error)),
        }
    }

    /// Success or the error text, ignoring any payload.
    pub fn check(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Self::failure(false, self.error))
        }
    }

    fn failure(success: bool, error: Option<String>) -> VaultError {
        match error {
            Some(msg) => VaultError::CommandFailed(msg),
            None if success => VaultError::CommandFailed("response carried no data".into()),
            None => VaultError::CommandFailed("unknown error".into()),
        }
    }
}

impl Response<()> {
    /// Unit results carry no `data` field: `{ success, error?, code? }`.
    fn from_unit(result: Result<()>) -> Self {
        let mut response = Self::from_result(result);
        response.data = None;
        response
    }
}

/// Payload of a successful import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub entries: Vec<Entry>,
}

#[derive(Clone)]
pub struct VaultApi {
    engine: SharedEngine,
}

impl VaultApi {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> SharedEngine {
        SharedEngine::clone(&self.engine)
    }

    pub fn init(&self) -> bool {
        self.with_engine(|e| Ok(e.is_initialized())).unwrap_or(false)
    }

    pub fn create_vault(&self, password: &str, entries: &[Value]) -> Response<()> {
        Response::from_unit(self.with_engine(|e| e.create_vault(password, entries)))
    }

    pub fn unlock(&self, password: &str, owner: OwnerRef) -> Response<Vec<Entry>> {
        Response::from_result(self.with_engine(|e| e.unlock(password, owner)))
    }

    pub fn list(&self, owner: OwnerRef) -> Response<Vec<Entry>> {
        Response::from_result(self.with_engine(|e| e.list(owner)))
    }

    pub fn upsert(&self, owner: OwnerRef, entry: &Value) -> Response<Vec<Entry>> {
        Response::from_result(self.with_engine(|e| e.upsert(owner, entry)))
    }

    pub fn remove(&self, owner: OwnerRef, id: &str) -> Response<Vec<Entry>> {
        Response::from_result(self.with_engine(|e| e.remove(owner, id)))
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Response<()> {
        Response::from_unit(self.with_engine(|e| e.change_password(old_password, new_password)))
    }

    pub fn lock(&self, reason: LockReason) {
        let _ = self.with_engine(|e| {
            e.lock(reason);
            Ok(())
        });
    }

    pub fn export_vault(
        &self,
        owner: OwnerRef,
        use_old_pass: bool,
        current_pass: &str,
        new_pass: Option<&str>,
    ) -> Response<PathBuf> {
        Response::from_result(
            self.with_engine(|e| e.export_vault(owner, use_old_pass, current_pass, new_pass)),
        )
    }

    pub fn import_vault(
        &self,
        owner: OwnerRef,
        password: &str,
        source: ImportSource,
    ) -> Response<ImportReport> {
        Response::from_result(self.with_engine(|e| {
            e.import_vault(owner, password, source)
                .map(|outcome| ImportReport {
                    status: outcome.status,
                    entries: outcome.entries,
                })
        }))
    }

    /// The real secret of one entry, or `""` on any failure.
    pub fn reveal_secret(&self, owner: OwnerRef, id: &str) -> String {
        self.with_engine(|e| e.reveal_secret(owner, id))
            .map(|s| s.as_str().to_owned())
            .unwrap_or_default()
    }

    /// Copy a secret with the decoy pattern; silently does nothing on failure.
    pub fn copy_secret_to_clipboard(&self, owner: OwnerRef, id: &str) -> Option<JoinHandle<()>> {
        self.with_engine(|e| e.copy_secret_to_clipboard(owner, id))
            .ok()
            .flatten()
    }

    pub fn subscribe(&self) -> Option<Receiver<VaultEvent>> {
        self.with_engine(|e| Ok(e.subscribe())).ok()
    }

    fn with_engine<T>(&self, f: impl FnOnce(&mut VaultEngine) -> Result<T>) -> Result<T> {
        let mut guard = self.lock_engine()?;
        f(&mut guard)
    }

    /// A poisoned lock means a call panicked mid-operation: wipe the
    /// session, clear the poison, and report the failure.
    fn lock_engine(&self) -> Result<MutexGuard<'_, VaultEngine>> {
        match self.engine.lock() {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                guard.lock(LockReason::Crash);
                drop(guard);
                self.engine.clear_poison();
                tracing::warn!("engine lock was poisoned, session wiped");
                Err(VaultError::Unexpected(
                    "the vault engine recovered from a crash and was locked".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_shape() {
        let r = Response::from_result(Ok(vec![1, 2]));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn error_response_shape() {
        let r: Response<()> = Response::from_result(Err(VaultError::Unauthorized));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "You cannot access the vault.",
                "code": "UNAUTHORIZED"
            })
        );
    }

    #[test]
    fn unit_success_has_no_data_field() {
        let r = Response::from_unit(Ok(()));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));
        assert!(r.check().is_ok());
    }

    #[test]
    fn check_reports_error_text() {
        let r = Response::from_unit(Err(VaultError::NotInitialized));
        assert_eq!(r.data, None);
        let err = r.check().unwrap_err();
        assert_eq!(err.to_string(), VaultError::NotInitialized.to_string());
    }

    #[test]
    fn into_result_carries_error_text() {
        let r: Response<()> = Response::from_result(Err(VaultError::DiskFull));
        let err = r.into_result().unwrap_err();
        assert_eq!(err.to_string(), "The disk is full, operation failed.");
    }
}
