//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::Entry;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of entries (Id, Type, Title, Username, Secret, Updated).
///
/// Callers pass masked entries; notes show their body length only.
pub fn print_entries_table(entries: &[Entry]) {
    if entries.is_empty() {
        info("No entries in this vault yet.");
        tip("Run `encryptoor add-login <TITLE>` to add your first login.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Type", "Title", "Username", "Secret", "Updated"]);

    for entry in entries {
        let (username, secret) = match entry {
            Entry::Login(l) => (l.username.clone(), l.password.clone()),
            Entry::Note(n) => (String::new(), format!("({} chars)", n.note.chars().count())),
        };
        table.add_row(vec![
            entry.id().to_string(),
            entry.kind().to_string(),
            entry.title().to_string(),
            username,
            secret,
            format_timestamp(entry.updated_at()),
        ]);
    }

    println!("{table}");
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

/// "1 entry" / "N entries".
pub fn entry_count(n: usize) -> String {
    if n == 1 {
        "1 entry".to_string()
    } else {
        format!("{n} entries")
    }
}
