//! Foundation types for the notes persistence core.
//!
//! Every other crate in the workspace depends on `notes-types`. It defines
//! the records that get persisted, the identity of the physical store, the
//! closed set of operations, and the messages exchanged between the
//! persistence coordinator and the background store worker.
//!
//! # Key Types
//!
//! - [`Note`] / [`NoteDraft`] -- a persisted note and the input used to write one
//! - [`NoteId`] -- integer primary key assigned by the store
//! - [`StoreSchema`] -- store name, schema version, and collection name
//! - [`Operation`] -- the closed set of actions (`init`, `add`, `put`, ...)
//! - [`CorrelationToken`] -- opaque per-request identity (UUID v7)
//! - [`ActionRequest`] / [`ActionResult`] -- coordinator <-> worker messages
//! - [`ErrorInfo`] -- structured failure carried inside an [`ActionResult`]

pub mod error;
pub mod message;
pub mod note;
pub mod operation;
pub mod params;
pub mod schema;
pub mod token;

pub use error::TypeError;
pub use message::{ActionRequest, ActionResult, ErrorInfo, ErrorKind, Payload};
pub use note::{Note, NoteDraft, NoteId};
pub use operation::Operation;
pub use params::Params;
pub use schema::StoreSchema;
pub use token::CorrelationToken;
