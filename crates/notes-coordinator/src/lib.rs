//! Persistence coordinator for the notes core.
//!
//! Sits between UI collaborators on the [`ActionBus`](notes_bus::ActionBus)
//! and the background store worker. Every action gets a correlation token;
//! results are matched by token and republished as `action-complete`.
//! Actions submitted before the store's `init` finishes are buffered, and
//! rejected locally if it fails.

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::NotesConfig;
pub use coordinator::{CoordinatorHandle, InitState, PersistenceCoordinator};
pub use error::{CoordinatorError, CoordinatorResult};
