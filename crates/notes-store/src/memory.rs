use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::record::Commit;

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Logs live behind a `RwLock` and are
/// cloned on load. The backend can be switched to read-only at any time,
/// after which every append and replace fails with [`StoreError::ReadOnly`].
pub struct MemoryBackend {
    stores: RwLock<HashMap<String, Vec<Commit>>>,
    read_only: AtomicBool,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Reject all further writes (or accept them again).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Number of commits in the named store's log.
    pub fn commit_count(&self, store: &str) -> usize {
        self.stores
            .read()
            .expect("lock poisoned")
            .get(store)
            .map_or(0, Vec::len)
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn load(&self, store: &str) -> StoreResult<Vec<Commit>> {
        let map = self.stores.read().expect("lock poisoned");
        Ok(map.get(store).cloned().unwrap_or_default())
    }

    fn append(&self, store: &str, commit: &Commit) -> StoreResult<()> {
        self.check_writable()?;
        let mut map = self.stores.write().expect("lock poisoned");
        map.entry(store.to_string()).or_default().push(commit.clone());
        Ok(())
    }

    fn replace(&self, store: &str, commits: &[Commit]) -> StoreResult<()> {
        self.check_writable()?;
        let mut map = self.stores.write().expect("lock poisoned");
        map.insert(store.to_string(), commits.to_vec());
        Ok(())
    }

    fn exists(&self, store: &str) -> StoreResult<bool> {
        let map = self.stores.read().expect("lock poisoned");
        Ok(map.get(store).is_some_and(|log| !log.is_empty()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.stores.read().expect("lock poisoned").len();
        f.debug_struct("MemoryBackend")
            .field("store_count", &count)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Mutation;

    fn commit(version: u32) -> Commit {
        Commit::new(vec![Mutation::SetVersion(version)])
    }

    #[test]
    fn unknown_store_loads_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.load("missing").unwrap().is_empty());
        assert!(!backend.exists("missing").unwrap());
    }

    #[test]
    fn append_preserves_order() {
        let backend = MemoryBackend::new();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(1), commit(2)]);
        assert!(backend.exists("Notes").unwrap());
        assert_eq!(backend.commit_count("Notes"), 2);
    }

    #[test]
    fn stores_are_isolated() {
        let backend = MemoryBackend::new();
        backend.append("a", &commit(1)).unwrap();
        assert!(backend.load("b").unwrap().is_empty());
    }

    #[test]
    fn read_only_rejects_writes_and_keeps_log() {
        let backend = MemoryBackend::new();
        backend.append("Notes", &commit(1)).unwrap();
        backend.set_read_only(true);
        assert!(matches!(backend.append("Notes", &commit(2)), Err(StoreError::ReadOnly)));
        assert!(matches!(backend.replace("Notes", &[]), Err(StoreError::ReadOnly)));
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(1)]);

        backend.set_read_only(false);
        backend.append("Notes", &commit(2)).unwrap();
        assert_eq!(backend.commit_count("Notes"), 2);
    }

    #[test]
    fn replace_swaps_log() {
        let backend = MemoryBackend::new();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        backend.replace("Notes", &[commit(3)]).unwrap();
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(3)]);
    }

    #[test]
    fn debug_format() {
        let backend = MemoryBackend::new();
        let debug = format!("{backend:?}");
        assert!(debug.contains("MemoryBackend"));
        assert!(debug.contains("store_count"));
    }
}
