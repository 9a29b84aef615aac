//! `encryptoor create`: create a new, empty vault.

use crate::cli::output;
use crate::cli::{open_api, prompt_new_password, Cli, PASSWORD_ENV};
use crate::errors::Result;

/// Execute the `create` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (api, settings) = open_api(cli)?;
    let password = prompt_new_password(PASSWORD_ENV)?;

    api.create_vault(&password, &[]).check()?;

    output::success(&format!("Vault created in {}", settings.vault_dir));
    output::tip("Add a login: encryptoor add-login <TITLE> --username <NAME>");
    Ok(())
}
