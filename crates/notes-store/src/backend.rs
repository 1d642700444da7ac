use crate::error::StoreResult;
use crate::record::Commit;

/// Durable home for store commit logs.
///
/// All implementations must satisfy these invariants:
/// - `append` is atomic: after it returns `Ok` the commit is part of the log,
///   after it returns `Err` the log is unchanged.
/// - `load` returns commits in the order they were appended.
/// - A store that was never appended to loads as an empty log.
/// - All I/O errors are propagated, never silently ignored.
pub trait Backend: Send + Sync {
    /// Read every committed transaction of the named store, oldest first.
    fn load(&self, store: &str) -> StoreResult<Vec<Commit>>;

    /// Durably append one transaction to the named store.
    fn append(&self, store: &str, commit: &Commit) -> StoreResult<()>;

    /// Atomically replace the whole log of the named store.
    ///
    /// Used by compaction. Either the old or the new log survives.
    fn replace(&self, store: &str, commits: &[Commit]) -> StoreResult<()>;

    /// Check whether the named store has ever been written.
    fn exists(&self, store: &str) -> StoreResult<bool>;

    /// Short backend name for log lines.
    fn kind(&self) -> &'static str;
}
