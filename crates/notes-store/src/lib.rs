//! Versioned, transactional note storage.
//!
//! The store is an append-only log of commits replayed into an in-memory
//! image on open. A named store carries a schema version and one or more
//! collections of notes keyed by [`NoteId`](notes_types::NoteId).
//!
//! # Key Types
//!
//! - [`ObjectStoreDriver`] -- opens stores, running schema upgrades as needed
//! - [`Connection`] -- an open store; `add`/`put`/`get`/`get_all`/`delete`
//! - [`Transaction`] -- staged writes committed as one log frame
//! - [`Cursor`] -- ordered, exactly-once scan of a collection
//!
//! # Storage Backends
//!
//! All backends implement the [`Backend`] trait:
//!
//! - [`FileBackend`] -- CRC-framed log file per store, with torn-tail recovery
//! - [`MemoryBackend`] -- `HashMap`-based log for tests and embedding
//!
//! # Design Rules
//!
//! 1. A transaction is either fully in the log or not at all.
//! 2. Auto-assigned keys start at 1 and never go backwards.
//! 3. An upgrade writes the new version and the collection in one commit.
//! 4. A scan that fails part way returns no notes.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod backend;
pub mod connection;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod file;
pub mod memory;
pub mod record;

pub use backend::Backend;
pub use connection::{Connection, Transaction, TransactionMode};
pub use cursor::Cursor;
pub use driver::ObjectStoreDriver;
pub use error::{StoreError, StoreResult};
pub use file::{FileBackend, FileBackendConfig, SyncMode};
pub use memory::MemoryBackend;
pub use record::{Commit, Mutation, StoreImage};
