use notes_types::NoteId;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The schema cannot be opened as given.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A committed log frame failed its integrity check.
    #[error("corrupt log for store {store} at offset {offset}: {reason}")]
    CorruptLog {
        store: String,
        offset: u64,
        reason: String,
    },

    /// A stored record could not be decoded.
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord { key: NoteId, reason: String },

    /// The caller asked for an older schema version than the one on disk.
    #[error("store {store} is at version {stored}, cannot open at version {requested}")]
    VersionTooLow {
        store: String,
        requested: u32,
        stored: u32,
    },

    /// The upgrade transaction could not be committed.
    #[error("upgrade of store {store} to version {version} failed: {source}")]
    UpgradeFailed {
        store: String,
        version: u32,
        #[source]
        source: Box<StoreError>,
    },

    /// The collection does not exist at the opened version.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// `add` hit a key that already exists.
    #[error("key {0} already exists")]
    Constraint(NoteId),

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// A write was attempted through a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnlyTransaction,
}

impl StoreError {
    /// Returns `true` if the error came out of a failed schema upgrade.
    pub fn is_upgrade_failure(&self) -> bool {
        matches!(self, Self::UpgradeFailed { .. })
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
