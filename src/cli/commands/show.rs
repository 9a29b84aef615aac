//! `encryptoor show`: print a login's password.

use crate::cli::{owner, unlock, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `show` command.
pub fn execute(cli: &Cli, id: &str) -> Result<()> {
    let (api, _password, _entries) = unlock(cli)?;

    let secret = zeroize::Zeroizing::new(api.reveal_secret(owner(), id));
    if secret.is_empty() {
        return Err(VaultError::CommandFailed(format!("nothing to show for '{id}'")));
    }

    println!("{}", secret.as_str());
    Ok(())
}
