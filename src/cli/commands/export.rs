//! `encryptoor export`: write a standalone backup of the vault.
//!
//! By default the backup keeps the current password. With
//! `--new-password` it is sealed under a fresh vault key and a new
//! password instead.

use crate::cli::output;
use crate::cli::{owner, prompt_new_password, unlock, Cli, NEW_PASSWORD_ENV};
use crate::errors::Result;

/// Execute the `export` command.
pub fn execute(cli: &Cli, new_password: bool) -> Result<()> {
    let (api, password, entries) = unlock(cli)?;

    let fresh = if new_password {
        Some(prompt_new_password(NEW_PASSWORD_ENV)?)
    } else {
        None
    };

    let path = api
        .export_vault(owner(), !new_password, &password, fresh.as_deref().map(String::as_str))
        .into_result()?;

    output::success(&format!(
        "Exported {} to {}",
        output::entry_count(entries.len()),
        path.display()
    ));
    Ok(())
}
