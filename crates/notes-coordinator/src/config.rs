use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use notes_store::{FileBackend, FileBackendConfig, ObjectStoreDriver, SyncMode};
use notes_types::StoreSchema;

use crate::error::{CoordinatorError, CoordinatorResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Directory holding the store logs.
    pub data_dir: PathBuf,
    pub sync_mode: SyncMode,
    /// Buffer size of each completion subscriber.
    pub completion_capacity: usize,
    /// Store identity every request is sent with.
    pub store: StoreSchema,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".notes"),
            sync_mode: SyncMode::default(),
            completion_capacity: notes_bus::DEFAULT_COMPLETION_CAPACITY,
            store: StoreSchema::default(),
        }
    }
}

impl NotesConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> CoordinatorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> CoordinatorResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CoordinatorError::Config(e.to_string()))?;
        config
            .store
            .validate()
            .map_err(|e| CoordinatorError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CoordinatorResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoordinatorError::Config(e.to_string()))
    }

    /// Driver over a file backend rooted at `data_dir`.
    pub fn open_driver(&self) -> CoordinatorResult<ObjectStoreDriver> {
        let backend = FileBackend::open(
            &self.data_dir,
            FileBackendConfig {
                sync_mode: self.sync_mode,
                read_only: false,
            },
        )?;
        Ok(ObjectStoreDriver::new(Arc::new(backend)))
    }
}
