use std::sync::Arc;

use tracing::{debug, info};

use notes_types::StoreSchema;

use crate::backend::Backend;
use crate::connection::Connection;
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryBackend;
use crate::record::{Commit, Mutation, StoreImage};

/// Opens named, versioned stores on a [`Backend`].
///
/// Opening replays the store's log. When the requested version is higher
/// than the stored one the store is upgraded: the new version and the
/// collection (if absent) are written together as one commit, so a failed
/// upgrade leaves the stored version unchanged.
#[derive(Clone)]
pub struct ObjectStoreDriver {
    backend: Arc<dyn Backend>,
}

impl ObjectStoreDriver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Driver over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Open `schema.name` at `schema.version`, upgrading it if needed.
    pub fn open(&self, schema: &StoreSchema) -> StoreResult<Connection> {
        schema
            .validate()
            .map_err(|e| StoreError::InvalidSchema(e.to_string()))?;

        let commits = self.backend.load(&schema.name)?;
        let mut image = StoreImage::replay(&schema.name, &commits)?;
        let stored = image.version;

        if schema.version < stored {
            return Err(StoreError::VersionTooLow {
                store: schema.name.clone(),
                requested: schema.version,
                stored,
            });
        }

        if schema.version > stored {
            let mut mutations = vec![Mutation::SetVersion(schema.version)];
            if image.collection(&schema.collection).is_none() {
                mutations.push(Mutation::CreateCollection {
                    name: schema.collection.clone(),
                });
            }
            let upgrade = Commit::new(mutations);
            self.backend
                .append(&schema.name, &upgrade)
                .map_err(|e| StoreError::UpgradeFailed {
                    store: schema.name.clone(),
                    version: schema.version,
                    source: Box::new(e),
                })?;
            image.apply_commit(&upgrade)?;
            info!(
                store = %schema.name,
                from = stored,
                to = schema.version,
                collection = %schema.collection,
                "store upgraded"
            );
        }

        if image.collection(&schema.collection).is_none() {
            return Err(StoreError::CollectionNotFound(schema.collection.clone()));
        }

        debug!(
            store = %schema.name,
            backend = self.backend.kind(),
            replayed = commits.len(),
            "store opened"
        );
        Ok(Connection::new(Arc::clone(&self.backend), schema.clone(), image))
    }
}

impl std::fmt::Debug for ObjectStoreDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreDriver")
            .field("backend", &self.backend.kind())
            .finish()
    }
}
