//! Action bus for the notes persistence core.
//!
//! Two narrow, typed channels replace a global string-keyed event bus:
//!
//! - `action-request` -- UI collaborators publish [`ActionRequestEvent`]s to
//!   a single subscriber, the persistence coordinator.
//! - `action-complete` -- the coordinator publishes [`ActionComplete`]s to
//!   any number of subscribers, each with an optional [`CompletionFilter`].

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{
    wait_for, ActionBus, CompletionFilter, CompletionStream, RequestSubscription,
    DEFAULT_COMPLETION_CAPACITY,
};
pub use error::{BusError, BusResult};
pub use event::{ActionComplete, ActionRequestEvent};
