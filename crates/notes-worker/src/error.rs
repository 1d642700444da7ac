use notes_store::StoreError;
use notes_types::{ErrorInfo, ErrorKind};

/// Errors from managing the worker thread itself.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker thread panicked")]
    Panicked,

    #[error("worker is not running")]
    Unavailable,
}

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Classify a failure to open the store.
pub fn open_error_info(err: &StoreError) -> ErrorInfo {
    let kind = match err {
        StoreError::UpgradeFailed { .. } => ErrorKind::SchemaUpgradeError,
        _ => ErrorKind::StoreOpenError,
    };
    ErrorInfo::new(kind, err.to_string())
}

/// Classify a failure inside an operation on an open store.
pub fn operation_error_info(err: &StoreError) -> ErrorInfo {
    let kind = match err {
        StoreError::Constraint(_) => ErrorKind::ConstraintError,
        StoreError::CollectionNotFound(_) => ErrorKind::StoreOpenError,
        _ => ErrorKind::TransactionFailed,
    };
    ErrorInfo::new(kind, err.to_string())
}
