/// Errors produced by the action bus.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    /// No request subscriber is attached.
    #[error("no subscriber for action requests")]
    NoSubscribers,

    /// Action requests already have a subscriber.
    #[error("action requests already have a subscriber")]
    AlreadySubscribed,

    /// The completion stream ended before the awaited event arrived.
    #[error("completion stream closed")]
    Closed,
}

/// Convenience alias used throughout the bus crate.
pub type BusResult<T> = Result<T, BusError>;
