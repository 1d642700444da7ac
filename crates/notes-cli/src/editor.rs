//! Input rules the client applies before anything reaches the store.
//!
//! The persistence core stores titles as given. Rejecting empty notes and
//! naming untitled ones is the editor's job.

use notes_types::params;
use notes_types::{Note, NoteDraft, Params};

/// Title given to a note saved without one.
pub const UNTITLED: &str = "Untitled Note";

/// Draft for a new note, or `None` when both fields are blank.
pub fn prepare(title: &str, note: &str) -> Option<NoteDraft> {
    if title.trim().is_empty() && note.trim().is_empty() {
        return None;
    }
    Some(NoteDraft::new(default_title(title), note))
}

/// Apply edits to an existing note. `None` when the result would be empty.
pub fn merge(existing: &Note, title: Option<String>, note: Option<String>) -> Option<NoteDraft> {
    let title = title.unwrap_or_else(|| existing.title.clone());
    let note = note.unwrap_or_else(|| existing.note.clone());
    prepare(&title, &note).map(|draft| draft.with_id(existing.id))
}

fn default_title(title: &str) -> String {
    if title.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

/// Request parameters for `add`/`put`.
pub fn draft_params(draft: &NoteDraft) -> anyhow::Result<Params> {
    Ok(params::from_value(serde_json::to_value(draft)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_types::NoteId;

    #[test]
    fn blank_note_is_rejected() {
        assert!(prepare("", "").is_none());
        assert!(prepare("  ", "\n").is_none());
    }

    #[test]
    fn blank_title_gets_default() {
        let draft = prepare("", "x").unwrap();
        assert_eq!(draft.title, UNTITLED);
        assert_eq!(draft.note, "x");
        assert!(draft.id.is_none());
    }

    #[test]
    fn title_only_is_allowed() {
        let draft = prepare("Groceries", "").unwrap();
        assert_eq!(draft.title, "Groceries");
    }

    #[test]
    fn merge_keeps_unedited_fields_and_id() {
        let existing = Note::new(NoteId::new(4), "old", "body");
        let draft = merge(&existing, Some("new".into()), None).unwrap();
        assert_eq!(draft.id, Some(NoteId::new(4)));
        assert_eq!(draft.title, "new");
        assert_eq!(draft.note, "body");
    }

    #[test]
    fn merge_cannot_empty_a_note() {
        let existing = Note::new(NoteId::new(4), "old", "");
        assert!(merge(&existing, Some(String::new()), None).is_none());
    }

    #[test]
    fn params_round_trip_through_request_helpers() {
        let draft = NoteDraft::new("t", "n").with_id(NoteId::new(2));
        let params = draft_params(&draft).unwrap();
        assert_eq!(params::note_draft(&params).unwrap(), draft);

        let fresh = draft_params(&NoteDraft::new("t", "n")).unwrap();
        assert_eq!(params::optional_note_id(&fresh).unwrap(), None);
    }
}
