//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::api::VaultApi;
use crate::config::Settings;
use crate::errors::{Result, VaultError};
use crate::vault::{Entry, OwnerRef, SharedEngine, VaultEngine};

/// Minimum length for newly chosen passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Vault password for non-interactive use.
pub const PASSWORD_ENV: &str = "ENCRYPTOOR_PASSWORD";

/// New password for `passwd` and re-keyed exports.
pub const NEW_PASSWORD_ENV: &str = "ENCRYPTOOR_NEW_PASSWORD";

/// Password of a foreign vault being imported.
pub const IMPORT_PASSWORD_ENV: &str = "ENCRYPTOOR_IMPORT_PASSWORD";

/// Encryptoor CLI: local encrypted credential vault.
#[derive(Parser)]
#[command(name = "encryptoor", about = "Local encrypted credential vault", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (overrides `vault_dir` from .encryptoor.toml)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show whether a vault exists
    Status,

    /// Create a new, empty vault
    Create,

    /// List entries (passwords masked)
    List,

    /// Add or update a login entry
    AddLogin {
        /// Entry title
        title: String,
        /// Account user name
        #[arg(short, long, default_value = "")]
        username: String,
        /// Website or service URL
        #[arg(short, long, default_value = "")]
        website: String,
        /// Existing entry id to replace (a new id is generated otherwise)
        #[arg(long)]
        id: Option<String>,
    },

    /// Add or update a secure note
    AddNote {
        /// Note title
        title: String,
        /// Note body
        body: String,
        /// Existing entry id to replace
        #[arg(long)]
        id: Option<String>,
    },

    /// Remove an entry by id
    Remove {
        /// Entry id
        id: String,
    },

    /// Print an entry's password
    Show {
        /// Entry id
        id: String,
    },

    /// Copy an entry's password to the clipboard
    Copy {
        /// Entry id
        id: String,
    },

    /// Change the master password
    Passwd,

    /// Export the vault to a standalone backup file
    Export {
        /// Protect the export with a new password and a fresh vault key
        #[arg(long)]
        new_password: bool,
    },

    /// Merge a backup file into the vault
    Import {
        /// Path to the backup file
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Initialise `tracing` for the binary. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Load settings from the working directory, applying `--vault-dir`.
pub fn load_settings(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let mut settings = Settings::load(&cwd)?;
    if let Some(dir) = &cli.vault_dir {
        settings.vault_dir = dir.clone();
    }
    Ok((settings, cwd))
}

/// Build the boundary API over a fresh engine.
pub fn open_api(cli: &Cli) -> Result<(VaultApi, Settings)> {
    let (settings, cwd) = load_settings(cli)?;
    let engine = VaultEngine::new(&settings, &cwd).into_shared();
    crate::host::install_crash_hook(SharedEngine::clone(&engine));
    Ok((VaultApi::new(engine), settings))
}

/// The session owner for this process.
pub fn owner() -> OwnerRef {
    OwnerRef(u64::from(std::process::id()))
}

/// Open the API and unlock the vault, returning the masked entries.
pub fn unlock(cli: &Cli) -> Result<(VaultApi, Zeroizing<String>, Vec<Entry>)> {
    let (api, _) = open_api(cli)?;
    if !api.init() {
        output::tip("Run `encryptoor create` to set up a vault.");
        return Err(VaultError::NotInitialized);
    }
    let password = prompt_password()?;
    let entries = api.unlock(&password, owner()).into_result()?;
    Ok((api, password, entries))
}

/// Get the vault password from `ENCRYPTOOR_PASSWORD` or an interactive prompt.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    prompt_secret(PASSWORD_ENV, "Enter vault password")
}

/// Password of a foreign backup, from `ENCRYPTOOR_IMPORT_PASSWORD` or a prompt.
pub fn prompt_import_password() -> Result<Zeroizing<String>> {
    prompt_secret(IMPORT_PASSWORD_ENV, "Enter the backup's password")
}

fn prompt_secret(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// `env_var` is checked first for scripted use. Enforces a minimum length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            if pw.chars().count() < MIN_PASSWORD_LEN {
                return Err(VaultError::CommandFailed(format!(
                    "password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault password")
            .with_confirmation("Confirm vault password", "Passwords do not match, try again")
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}
