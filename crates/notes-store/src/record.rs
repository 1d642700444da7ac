//! Log records and the in-memory image they replay into.
//!
//! A store is persisted as an ordered sequence of [`Commit`]s. Each commit
//! holds every mutation of one transaction and is written as a single
//! frame, so a transaction is either fully in the log or not at all.
//! Replaying the commits front to back rebuilds the [`StoreImage`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use notes_types::{Note, NoteId};

use crate::error::{StoreError, StoreResult};

/// Key generators start here.
pub const FIRST_KEY: NoteId = NoteId::new(1);

/// A single change to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Record the schema version the store was upgraded to.
    SetVersion(u32),
    /// Create a collection keyed by `id` with key auto-assignment.
    CreateCollection { name: String },
    /// Raise a collection's key generator. Written by compaction so the
    /// generator never moves backwards once deleted records are dropped.
    SetKeyGenerator { collection: String, next: NoteId },
    /// Insert or replace the encoded record under `key`.
    Put {
        collection: String,
        key: NoteId,
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete { collection: String, key: NoteId },
}

/// One committed transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub mutations: Vec<Mutation>,
}

impl Commit {
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Encode a note for storage.
pub fn encode_note(note: &Note) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(note)?)
}

/// Decode a stored note, checking that its embedded key matches `key`.
pub fn decode_note(key: NoteId, bytes: &[u8]) -> StoreResult<Note> {
    let note: Note = bincode::deserialize(bytes).map_err(|e| StoreError::CorruptRecord {
        key,
        reason: e.to_string(),
    })?;
    if note.id != key {
        return Err(StoreError::CorruptRecord {
            key,
            reason: format!("record carries key {}", note.id),
        });
    }
    Ok(note)
}

/// Records of one collection plus its key generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionData {
    pub records: BTreeMap<NoteId, Vec<u8>>,
    /// Next key handed out by auto-assignment. Never decreases.
    pub next_key: NoteId,
}

impl CollectionData {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_key: FIRST_KEY,
        }
    }

    /// Raise the generator past an explicitly supplied key.
    pub fn observe_key(&mut self, key: NoteId) {
        if key >= self.next_key {
            self.next_key = key.next();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for CollectionData {
    fn default() -> Self {
        Self::new()
    }
}

/// Materialized state of a store: version plus collections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreImage {
    /// Stored schema version; 0 means the store has never been created.
    pub version: u32,
    pub collections: BTreeMap<String, CollectionData>,
}

impl StoreImage {
    /// Rebuild an image from its commit log.
    pub fn replay(store: &str, commits: &[Commit]) -> StoreResult<Self> {
        let mut image = Self::default();
        for commit in commits {
            image.apply_commit(commit).map_err(|e| StoreError::CorruptLog {
                store: store.to_string(),
                offset: 0,
                reason: e.to_string(),
            })?;
        }
        Ok(image)
    }

    pub fn apply_commit(&mut self, commit: &Commit) -> StoreResult<()> {
        for mutation in &commit.mutations {
            self.apply(mutation)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, mutation: &Mutation) -> StoreResult<()> {
        match mutation {
            Mutation::SetVersion(version) => self.version = *version,
            Mutation::CreateCollection { name } => {
                self.collections.entry(name.clone()).or_default();
            }
            Mutation::SetKeyGenerator { collection, next } => {
                let data = self.collection_mut(collection)?;
                if *next > data.next_key {
                    data.next_key = *next;
                }
            }
            Mutation::Put {
                collection,
                key,
                value,
            } => {
                let data = self.collection_mut(collection)?;
                data.observe_key(*key);
                data.records.insert(*key, value.clone());
            }
            Mutation::Delete { collection, key } => {
                self.collection_mut(collection)?.records.remove(key);
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name)
    }

    fn collection_mut(&mut self, name: &str) -> StoreResult<&mut CollectionData> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    /// The shortest commit sequence that rebuilds this image.
    pub fn snapshot(&self) -> Vec<Commit> {
        let mut mutations = vec![Mutation::SetVersion(self.version)];
        for (name, data) in &self.collections {
            mutations.push(Mutation::CreateCollection { name: name.clone() });
            mutations.push(Mutation::SetKeyGenerator {
                collection: name.clone(),
                next: data.next_key,
            });
            for (key, value) in &data.records {
                mutations.push(Mutation::Put {
                    collection: name.clone(),
                    key: *key,
                    value: value.clone(),
                });
            }
        }
        vec![Commit::new(mutations)]
    }
}
