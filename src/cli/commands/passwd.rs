//! `encryptoor passwd`: change the master password.

use crate::cli::output;
use crate::cli::{open_api, prompt_new_password, prompt_password, Cli, NEW_PASSWORD_ENV};
use crate::errors::{Result, VaultError};

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (api, _) = open_api(cli)?;
    if !api.init() {
        return Err(VaultError::NotInitialized);
    }

    let current = prompt_password()?;
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    api.change_password(&current, &new_password).check()?;

    output::success("Master password changed.");
    output::tip("Existing exports keep the password they were made with.");
    Ok(())
}
