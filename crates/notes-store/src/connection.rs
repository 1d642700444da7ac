use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use notes_types::{Note, NoteDraft, NoteId, StoreSchema};

use crate::backend::Backend;
use crate::cursor::Cursor;
use crate::error::{StoreError, StoreResult};
use crate::record::{decode_note, encode_note, CollectionData, Commit, Mutation, StoreImage};

/// Access mode of a [`Transaction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// An open store, bound to the collection named by its schema.
///
/// Produced by [`ObjectStoreDriver::open`](crate::ObjectStoreDriver::open).
/// Every operation runs inside its own transaction that is committed or
/// dropped before the method returns.
pub struct Connection {
    backend: Arc<dyn Backend>,
    schema: StoreSchema,
    image: StoreImage,
}

impl Connection {
    pub(crate) fn new(backend: Arc<dyn Backend>, schema: StoreSchema, image: StoreImage) -> Self {
        Self {
            backend,
            schema,
            image,
        }
    }

    /// Schema the connection was opened with.
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Stored schema version.
    pub fn version(&self) -> u32 {
        self.image.version
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.image.collection(name).is_some()
    }

    /// Begin a transaction on the connection's collection.
    pub fn transaction(&mut self, mode: TransactionMode) -> StoreResult<Transaction<'_>> {
        let collection = self.schema.collection.clone();
        let next_key = self
            .image
            .collection(&collection)
            .map(|data| data.next_key)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
        Ok(Transaction {
            conn: self,
            collection,
            mode,
            overlay: BTreeMap::new(),
            next_key,
            pending: Vec::new(),
        })
    }

    /// Insert a new note. Fails with [`StoreError::Constraint`] if the key exists.
    pub fn add(&mut self, draft: NoteDraft) -> StoreResult<NoteId> {
        let mut tx = self.transaction(TransactionMode::ReadWrite)?;
        let id = tx.add(draft)?;
        tx.commit()?;
        Ok(id)
    }

    /// Insert or fully replace a note.
    pub fn put(&mut self, draft: NoteDraft) -> StoreResult<NoteId> {
        let mut tx = self.transaction(TransactionMode::ReadWrite)?;
        let id = tx.put(draft)?;
        tx.commit()?;
        Ok(id)
    }

    /// Point lookup. An absent key is `Ok(None)`, not an error.
    pub fn get(&mut self, id: NoteId) -> StoreResult<Option<Note>> {
        let tx = self.transaction(TransactionMode::ReadOnly)?;
        tx.get(id)
    }

    /// Every note of the collection in ascending key order.
    pub fn get_all(&mut self) -> StoreResult<Vec<Note>> {
        let tx = self.transaction(TransactionMode::ReadOnly)?;
        tx.open_cursor().collect_all()
    }

    /// Remove a note. Removing an absent key succeeds without writing.
    pub fn delete(&mut self, id: NoteId) -> StoreResult<()> {
        let mut tx = self.transaction(TransactionMode::ReadWrite)?;
        tx.delete(id)?;
        tx.commit()
    }

    /// Number of notes in the collection.
    pub fn count(&self) -> StoreResult<usize> {
        self.image
            .collection(&self.schema.collection)
            .map(CollectionData::len)
            .ok_or_else(|| StoreError::CollectionNotFound(self.schema.collection.clone()))
    }

    /// Rewrite the backing log with only the live state.
    pub fn compact(&mut self) -> StoreResult<()> {
        let commits = self.image.snapshot();
        self.backend.replace(&self.schema.name, &commits)?;
        info!(store = %self.schema.name, "commit log compacted");
        Ok(())
    }

    /// Release the connection.
    pub fn close(self) {
        debug!(store = %self.schema.name, version = self.image.version, "connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("schema", &self.schema)
            .field("backend", &self.backend.kind())
            .field("version", &self.image.version)
            .finish()
    }
}

/// A unit of work against one collection.
///
/// Writes are staged in the transaction and become visible to the
/// connection only on [`commit`](Transaction::commit), which appends them to
/// the backend as a single commit. Dropping an uncommitted transaction
/// discards everything it staged.
pub struct Transaction<'c> {
    conn: &'c mut Connection,
    collection: String,
    mode: TransactionMode,
    /// Staged writes: `Some` for a put, `None` for a delete.
    overlay: BTreeMap<NoteId, Option<Vec<u8>>>,
    next_key: NoteId,
    pending: Vec<Mutation>,
}

impl Transaction<'_> {
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn base(&self) -> Option<&CollectionData> {
        self.conn.image.collection(&self.collection)
    }

    fn lookup(&self, key: NoteId) -> Option<&[u8]> {
        match self.overlay.get(&key) {
            Some(staged) => staged.as_deref(),
            None => self
                .base()
                .and_then(|data| data.records.get(&key))
                .map(Vec::as_slice),
        }
    }

    fn require_writable(&self) -> StoreResult<()> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(StoreError::ReadOnlyTransaction);
        }
        Ok(())
    }

    fn assign_key(&mut self, requested: Option<NoteId>) -> NoteId {
        match requested {
            Some(key) => {
                if key >= self.next_key {
                    self.next_key = key.next();
                }
                key
            }
            None => {
                let key = self.next_key;
                self.next_key = key.next();
                key
            }
        }
    }

    fn stage_put(&mut self, note: Note) -> StoreResult<NoteId> {
        let key = note.id;
        let value = encode_note(&note)?;
        self.overlay.insert(key, Some(value.clone()));
        self.pending.push(Mutation::Put {
            collection: self.collection.clone(),
            key,
            value,
        });
        Ok(key)
    }

    pub fn get(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.lookup(id).map(|bytes| decode_note(id, bytes)).transpose()
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.lookup(id).is_some()
    }

    pub fn add(&mut self, draft: NoteDraft) -> StoreResult<NoteId> {
        self.require_writable()?;
        if let Some(id) = draft.id {
            if self.contains(id) {
                return Err(StoreError::Constraint(id));
            }
        }
        let key = self.assign_key(draft.id);
        if draft.id.is_none() && self.contains(key) {
            return Err(StoreError::Constraint(key));
        }
        self.stage_put(draft.into_note(key))
    }

    pub fn put(&mut self, draft: NoteDraft) -> StoreResult<NoteId> {
        self.require_writable()?;
        let key = self.assign_key(draft.id);
        self.stage_put(draft.into_note(key))
    }

    /// Stage removal of `id`. Returns whether the key was present.
    pub fn delete(&mut self, id: NoteId) -> StoreResult<bool> {
        self.require_writable()?;
        if !self.contains(id) {
            return Ok(false);
        }
        self.overlay.insert(id, None);
        self.pending.push(Mutation::Delete {
            collection: self.collection.clone(),
            key: id,
        });
        Ok(true)
    }

    /// Cursor over the collection as this transaction sees it.
    pub fn open_cursor(&self) -> Cursor<'_> {
        let mut entries: BTreeMap<NoteId, &[u8]> = self
            .base()
            .map(|data| {
                data.records
                    .iter()
                    .map(|(key, value)| (*key, value.as_slice()))
                    .collect()
            })
            .unwrap_or_default();
        for (key, staged) in &self.overlay {
            match staged {
                Some(value) => {
                    entries.insert(*key, value.as_slice());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        Cursor::new(entries.into_iter().collect())
    }

    /// Persist every staged write as one commit, then apply it.
    pub fn commit(self) -> StoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let commit = Commit::new(self.pending);
        self.conn.backend.append(&self.conn.schema.name, &commit)?;
        self.conn.image.apply_commit(&commit)?;
        debug!(
            store = %self.conn.schema.name,
            collection = %self.collection,
            mutations = commit.mutations.len(),
            "transaction committed"
        );
        Ok(())
    }

    /// Discard every staged write.
    pub fn abort(self) {
        debug!(collection = %self.collection, staged = self.pending.len(), "transaction aborted");
    }
}
