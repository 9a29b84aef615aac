//! `encryptoor add-note`: add or replace a secure note.

use uuid::Uuid;

use crate::cli::output;
use crate::cli::{owner, unlock, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{Entry, NoteEntry};

/// Execute the `add-note` command.
pub fn execute(cli: &Cli, title: &str, body: &str, id: Option<&str>) -> Result<()> {
    let (api, _password, current) = unlock(cli)?;

    let now = chrono::Utc::now().timestamp_millis();
    let (id, created_at) = resolve_id(&current, id, now);

    let entry = Entry::Note(NoteEntry {
        id,
        title: title.to_string(),
        note: body.to_string(),
        created_at,
        updated_at: now,
    });
    let value =
        serde_json::to_value(&entry).map_err(|e| VaultError::Serialization(e.to_string()))?;

    let entries = api.upsert(owner(), &value).into_result()?;
    output::success(&format!("Saved note '{title}' ({} total)", entries.len()));
    Ok(())
}

/// Pick the id and creation time for an upsert: keep both when replacing
/// an existing entry, otherwise mint a fresh id.
pub(crate) fn resolve_id(current: &[Entry], id: Option<&str>, now: i64) -> (String, i64) {
    match id {
        Some(id) => {
            let created = current
                .iter()
                .find(|e| e.id() == id)
                .map(created_at)
                .unwrap_or(now);
            (id.to_string(), created)
        }
        None => (Uuid::new_v4().to_string(), now),
    }
}

fn created_at(entry: &Entry) -> i64 {
    match entry {
        Entry::Login(l) => l.created_at,
        Entry::Note(n) => n.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_creation_time_of_existing_entry() {
        let current = vec![Entry::Note(NoteEntry {
            id: "n1".into(),
            title: "t".into(),
            note: "b".into(),
            created_at: 5,
            updated_at: 6,
        })];
        assert_eq!(resolve_id(&current, Some("n1"), 100), ("n1".to_string(), 5));
        assert_eq!(resolve_id(&current, Some("other"), 100).1, 100);

        let (fresh, created) = resolve_id(&current, None, 100);
        assert_eq!(fresh.len(), 36);
        assert_eq!(created, 100);
    }
}
