use notes_types::{Note, NoteId};

use crate::error::StoreResult;
use crate::record::decode_note;

/// Sequential iterator over every record of a collection, in key order.
///
/// The cursor is positioned on construction over a fixed list of keys, so
/// each record is visited exactly once regardless of what the caller does
/// with the notes it receives. Values are decoded lazily; a record that
/// fails to decode is returned as an error at its position.
pub struct Cursor<'t> {
    entries: Vec<(NoteId, &'t [u8])>,
    position: usize,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(entries: Vec<(NoteId, &'t [u8])>) -> Self {
        Self {
            entries,
            position: 0,
        }
    }

    /// Key of the record the cursor will yield next.
    pub fn key(&self) -> Option<NoteId> {
        self.entries.get(self.position).map(|(key, _)| *key)
    }

    /// Number of records not yet visited.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.position
    }

    /// Decode the current record and advance past it.
    pub fn advance(&mut self) -> Option<StoreResult<Note>> {
        let (key, bytes) = *self.entries.get(self.position)?;
        self.position += 1;
        Some(decode_note(key, bytes))
    }

    /// Drain the cursor into a list. Any failing record discards the
    /// whole result, so callers never see a partial scan.
    pub fn collect_all(mut self) -> StoreResult<Vec<Note>> {
        let mut notes = Vec::with_capacity(self.remaining());
        while let Some(next) = self.advance() {
            notes.push(next?);
        }
        Ok(notes)
    }
}

impl Iterator for Cursor<'_> {
    type Item = StoreResult<Note>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
