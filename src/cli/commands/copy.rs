//! `encryptoor copy`: put a login's password on the clipboard.
//!
//! The process stays alive until the clipboard window has passed so the
//! conditional clear can run.

use crate::cli::output;
use crate::cli::{load_settings, owner, unlock, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `copy` command.
pub fn execute(cli: &Cli, id: &str) -> Result<()> {
    let (api, _password, _entries) = unlock(cli)?;
    let (settings, _) = load_settings(cli)?;

    let Some(handle) = api.copy_secret_to_clipboard(owner(), id) else {
        return Err(VaultError::CommandFailed(format!("nothing to copy for '{id}'")));
    };

    output::success("Password copied to the clipboard.");
    output::tip(&format!(
        "The clipboard is cleared in {} seconds.",
        settings.clipboard_clear_secs
    ));

    handle
        .join()
        .map_err(|_| VaultError::Unexpected("clipboard thread panicked".into()))
}
