//! `encryptoor remove`: delete an entry by id.

use crate::cli::output;
use crate::cli::{owner, unlock, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, id: &str) -> Result<()> {
    let (api, _password, current) = unlock(cli)?;

    if !current.iter().any(|e| e.id() == id) {
        return Err(VaultError::CommandFailed(format!("no entry with id '{id}'")));
    }

    let entries = api.remove(owner(), id).into_result()?;
    output::success(&format!("Removed '{id}' ({} left)", entries.len()));
    Ok(())
}
