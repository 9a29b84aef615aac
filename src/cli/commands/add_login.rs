//! `encryptoor add-login`: add or replace a login entry.

use std::io::{self, IsTerminal, Read};

use zeroize::{Zeroize, Zeroizing};

use crate::cli::output;
use crate::cli::{owner, unlock, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{Entry, LoginEntry};

/// Execute the `add-login` command.
pub fn execute(
    cli: &Cli,
    title: &str,
    username: &str,
    website: &str,
    id: Option<&str>,
) -> Result<()> {
    let (api, _password, current) = unlock(cli)?;

    // The entry's secret comes from stdin when piped, otherwise a prompt.
    let secret = if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end().to_string())
    } else {
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Password for {title}"))
                .interact()
                .map_err(|e| VaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    let now = chrono::Utc::now().timestamp_millis();
    let (id, created_at) = super::add_note::resolve_id(&current, id, now);

    let mut entry = Entry::Login(LoginEntry {
        id,
        title: title.to_string(),
        username: username.to_string(),
        password: secret.to_string(),
        website: website.to_string(),
        created_at,
        updated_at: now,
    });
    let value = serde_json::to_value(&entry);
    entry.zeroize();
    let value = value.map_err(|e| VaultError::Serialization(e.to_string()))?;

    let entries = api.upsert(owner(), &value).into_result()?;
    output::success(&format!("Saved login '{title}' ({} total)", entries.len()));
    Ok(())
}
