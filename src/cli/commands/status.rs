//! `encryptoor status`: report whether a vault exists.

use crate::cli::output;
use crate::cli::{open_api, Cli};
use crate::errors::Result;

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (api, settings) = open_api(cli)?;

    if api.init() {
        output::success(&format!("Vault found in {}", settings.vault_dir));
    } else {
        output::info(&format!("No vault in {}", settings.vault_dir));
        output::tip("Run `encryptoor create` to set one up.");
    }

    Ok(())
}
