use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] notes_store::StoreError),

    #[error("worker error: {0}")]
    Worker(#[from] notes_worker::WorkerError),

    #[error("bus error: {0}")]
    Bus(#[from] notes_bus::BusError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coordinator has shut down")]
    Shutdown,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
