//! Vault entries and the sanitizer that admits them.
//!
//! Every entry that reaches disk has gone through [`sanitize`], a total
//! function from untrusted JSON to a canonical, bounded, explicitly
//! discriminated [`Entry`] (or a rejection; never a partial record).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroize;

use crate::errors::{Result, VaultError};

/// Upper bound for every string field, in characters.
pub const MAX_FIELD_LEN: usize = 4096;

/// Character used to mask secrets shown to the presentation layer.
pub const MASK_CHAR: char = '\u{2022}';

/// A login credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEntry {
    pub id: String,
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A free-form secure note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub id: String,
    pub title: String,
    pub note: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One record in the vault, tagged on disk by `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    Login(LoginEntry),
    Note(NoteEntry),
}

impl Entry {
    pub fn id(&self) -> &str {
        match self {
            Self::Login(e) => &e.id,
            Self::Note(e) => &e.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Login(e) => &e.title,
            Self::Note(e) => &e.title,
        }
    }

    pub fn updated_at(&self) -> i64 {
        match self {
            Self::Login(e) => e.updated_at,
            Self::Note(e) => e.updated_at,
        }
    }

    /// Short type name, as stored in the discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Note(_) => "note",
        }
    }

    /// The login password, if this entry carries one.
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Login(e) => Some(&e.password),
            Self::Note(_) => None,
        }
    }

    /// Turn an imported conflict into a separate row: new id, annotated title.
    pub(crate) fn relabel(&mut self, id: String, suffix: &str) {
        let (entry_id, title) = match self {
            Self::Login(e) => (&mut e.id, &mut e.title),
            Self::Note(e) => (&mut e.id, &mut e.title),
        };
        *entry_id = id;
        title.push(' ');
        title.push_str(suffix);
    }

    /// A copy safe to hand to the presentation layer: the password is
    /// replaced by a placeholder of the same length.
    pub fn masked(&self) -> Entry {
        match self {
            Self::Login(e) => Self::Login(LoginEntry {
                password: mask(&e.password),
                ..e.clone()
            }),
            Self::Note(_) => self.clone(),
        }
    }
}

impl Zeroize for Entry {
    fn zeroize(&mut self) {
        match self {
            Self::Login(e) => {
                e.id.zeroize();
                e.title.zeroize();
                e.username.zeroize();
                e.password.zeroize();
                e.website.zeroize();
            }
            Self::Note(e) => {
                e.id.zeroize();
                e.title.zeroize();
                e.note.zeroize();
            }
        }
    }
}

/// Mask every entry in a working set.
pub fn mask_entries(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().map(Entry::masked).collect()
}

fn mask(secret: &str) -> String {
    std::iter::repeat(MASK_CHAR)
        .take(secret.chars().count())
        .collect()
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

/// Validate untrusted input and build a canonical entry.
///
/// Requires an object with an explicit `"type"` of `"login"` or `"note"`,
/// every field of that variant present with the right JSON type, strings
/// no longer than [`MAX_FIELD_LEN`] characters and positive integer
/// timestamps. Identifier-like fields are trimmed; secrets are kept
/// verbatim. Unknown keys are dropped.
pub fn sanitize(input: &Value) -> Result<Entry> {
    let obj = input
        .as_object()
        .ok_or_else(|| invalid("entry must be an object"))?;

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing entry type"))?;

    match kind {
        "login" => Ok(Entry::Login(LoginEntry {
            id: id_field(obj)?,
            title: string_field(obj, "title")?.trim().to_string(),
            username: string_field(obj, "username")?.trim().to_string(),
            password: string_field(obj, "password")?.to_string(),
            website: string_field(obj, "website")?.trim().to_string(),
            created_at: timestamp_field(obj, "createdAt")?,
            updated_at: timestamp_field(obj, "updatedAt")?,
        })),
        "note" => Ok(Entry::Note(NoteEntry {
            id: id_field(obj)?,
            title: string_field(obj, "title")?.trim().to_string(),
            note: string_field(obj, "note")?.to_string(),
            created_at: timestamp_field(obj, "createdAt")?,
            updated_at: timestamp_field(obj, "updatedAt")?,
        })),
        other => Err(invalid(&format!("unknown entry type '{other}'"))),
    }
}

fn invalid(reason: &str) -> VaultError {
    VaultError::InvalidEntry(reason.to_string())
}

fn string_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    let s = obj
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&format!("field '{name}' must be a string")))?;
    if s.chars().count() > MAX_FIELD_LEN {
        return Err(invalid(&format!(
            "field '{name}' exceeds {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(s)
}

fn id_field(obj: &Map<String, Value>) -> Result<String> {
    let id = string_field(obj, "id")?.trim();
    if id.is_empty() {
        return Err(invalid("field 'id' cannot be empty"));
    }
    Ok(id.to_string())
}

fn timestamp_field(obj: &Map<String, Value>, name: &str) -> Result<i64> {
    obj.get(name)
        .and_then(Value::as_i64)
        .filter(|ts| *ts > 0)
        .ok_or_else(|| invalid(&format!("field '{name}' must be a positive integer")))
}
