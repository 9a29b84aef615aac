//! `encryptoor list`: display all entries in a table, passwords masked.

use crate::cli::output;
use crate::cli::{unlock, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (_api, _password, entries) = unlock(cli)?;

    output::info(&output::entry_count(entries.len()));
    output::print_entries_table(&entries);
    Ok(())
}
