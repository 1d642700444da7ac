use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a note inside its collection.
///
/// Keys are assigned by the store on first insert and never change
/// afterwards. Auto-assigned keys start at 1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(u64);

impl NoteId {
    /// Create a key from its raw integer value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The key immediately following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteId({})", self.0)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NoteId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A persisted note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub note: String,
}

impl Note {
    pub fn new(id: NoteId, title: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            note: note.into(),
        }
    }
}

/// Input for `add` and `put`: a note whose key may not be known yet.
///
/// When `id` is `None` the store assigns the next key from the collection's
/// key generator. The core stores `title` and `note` exactly as given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    pub title: String,
    pub note: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            note: note.into(),
        }
    }

    /// Pin the draft to an explicit key.
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Materialize the draft under the given key.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            title: self.title,
            note: self.note,
        }
    }
}

impl From<Note> for NoteDraft {
    fn from(note: Note) -> Self {
        Self {
            id: Some(note.id),
            title: note.title,
            note: note.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_id_is_plain_integer_on_the_wire() {
        let json = serde_json::to_string(&NoteId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: NoteId = serde_json::from_str("7").unwrap();
        assert_eq!(back.get(), 7);
    }

    #[test]
    fn note_id_next_saturates() {
        assert_eq!(NoteId::new(1).next(), NoteId::new(2));
        assert_eq!(NoteId::new(u64::MAX).next(), NoteId::new(u64::MAX));
    }

    #[test]
    fn draft_without_id_omits_field() {
        let draft = NoteDraft::new("t", "n");
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["title"], "t");
    }

    #[test]
    fn draft_into_note_keeps_content() {
        let note = NoteDraft::new("", "x").into_note(NoteId::new(3));
        assert_eq!(note, Note::new(NoteId::new(3), "", "x"));
    }

    #[test]
    fn note_converts_back_to_pinned_draft() {
        let draft = NoteDraft::from(Note::new(NoteId::new(9), "a", "b"));
        assert_eq!(draft.id, Some(NoteId::new(9)));
    }
}
