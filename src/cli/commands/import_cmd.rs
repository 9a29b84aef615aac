//! `encryptoor import`: merge a backup file into the vault.
//!
//! Nothing is overwritten: an entry that conflicts with an existing id is
//! added as a separate, title-annotated row.

use std::path::Path;

use crate::cli::output;
use crate::cli::{owner, prompt_import_password, unlock, Cli};
use crate::errors::Result;
use crate::vault::ImportSource;

/// Execute the `import` command.
pub fn execute(cli: &Cli, file: &Path) -> Result<()> {
    let (api, _password, _entries) = unlock(cli)?;
    let backup_password = prompt_import_password()?;

    let report = api
        .import_vault(owner(), &backup_password, ImportSource::Path(file.to_path_buf()))
        .into_result()?;

    output::success(&format!(
        "Imported {}, skipped {}",
        output::entry_count(report.status.new),
        report.status.skipped
    ));
    output::print_entries_table(&report.entries);
    Ok(())
}
