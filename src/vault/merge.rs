//! Non-destructive reconciliation of an imported vault into the working set.
//!
//! Conflicting versions of the same entry never overwrite each other:
//! a newer or older copy is added as a separate row with its own id and
//! an annotated title.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::vault::entry::{sanitize, Entry};

pub const NEWER_TAG: &str = "[Newer from Backup]";
pub const OLDER_TAG: &str = "[Older from Backup]";

/// Counts reported back to the caller after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatus {
    pub new: usize,
    pub skipped: usize,
}

/// Merge `incoming` (untrusted, decrypted from a foreign vault) into a
/// copy of `current`.
///
/// - Entries failing sanitization are skipped.
/// - Unknown ids are added as they are.
/// - A known id with a strictly later `updatedAt` is added under a fresh
///   id, titled with [`NEWER_TAG`]; strictly earlier, with [`OLDER_TAG`].
/// - An equal `updatedAt` is a duplicate and is skipped.
pub fn merge_entries(current: &[Entry], incoming: &[Value]) -> (Vec<Entry>, ImportStatus) {
    let mut merged = current.to_vec();
    let mut status = ImportStatus::default();

    for raw in incoming {
        let Ok(mut entry) = sanitize(raw) else {
            status.skipped += 1;
            continue;
        };

        let existing = merged
            .iter()
            .find(|e| e.id() == entry.id())
            .map(Entry::updated_at);

        match existing.map(|ts| entry.updated_at().cmp(&ts)) {
            None => {}
            Some(Ordering::Greater) => entry.relabel(Uuid::new_v4().to_string(), NEWER_TAG),
            Some(Ordering::Less) => entry.relabel(Uuid::new_v4().to_string(), OLDER_TAG),
            Some(Ordering::Equal) => {
                status.skipped += 1;
                continue;
            }
        }

        merged.push(entry);
        status.new += 1;
    }

    (merged, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(id: &str, updated: i64) -> Value {
        json!({
            "type": "note", "id": id, "title": "Note", "note": "body",
            "createdAt": 1, "updatedAt": updated
        })
    }

    fn current() -> Vec<Entry> {
        vec![sanitize(&note("a", 100)).unwrap()]
    }

    #[test]
    fn adopts_unknown_ids() {
        let (merged, status) = merge_entries(&current(), &[note("b", 5)]);
        assert_eq!(status, ImportStatus { new: 1, skipped: 0 });
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].title(), "Note");
    }

    #[test]
    fn newer_copy_is_added_alongside() {
        let (merged, status) = merge_entries(&current(), &[note("a", 200)]);
        assert_eq!(status.new, 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title(), "Note");
        assert_eq!(merged[1].title(), "Note [Newer from Backup]");
        assert_eq!(merged[0].id(), "a");
        assert_ne!(merged[1].id(), "a");
        assert!(Uuid::parse_str(merged[1].id()).is_ok());
    }

    #[test]
    fn older_copy_is_added_alongside() {
        let (merged, _) = merge_entries(&current(), &[note("a", 50)]);
        assert_eq!(merged[1].title(), "Note [Older from Backup]");
        assert_ne!(merged[1].id(), "a");
    }

    #[test]
    fn repeated_conflicts_get_distinct_ids() {
        let (merged, status) = merge_entries(&current(), &[note("a", 200), note("a", 300)]);
        assert_eq!(status.new, 2);
        let mut ids: Vec<&str> = merged.iter().map(Entry::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn equal_timestamp_is_skipped() {
        let (merged, status) = merge_entries(&current(), &[note("a", 100)]);
        assert_eq!(status, ImportStatus { new: 0, skipped: 1 });
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let (merged, status) =
            merge_entries(&current(), &[json!({"id": "x"}), json!("nope"), note("c", 1)]);
        assert_eq!(status, ImportStatus { new: 1, skipped: 2 });
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn current_set_is_not_mutated() {
        let before = current();
        let _ = merge_entries(&before, &[note("a", 999)]);
        assert_eq!(before, current());
    }
}
