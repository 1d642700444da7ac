use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub const DEFAULT_STORE_NAME: &str = "Notes";
pub const DEFAULT_STORE_VERSION: u32 = 1;
pub const DEFAULT_COLLECTION: &str = "notes";

/// Identity of a physical store and the collection inside it.
///
/// Opening a store with a `version` above the stored one runs an upgrade,
/// which creates `collection` (keyed by `id`, auto-assigned) if absent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreSchema {
    pub name: String,
    pub version: u32,
    pub collection: String,
}

impl StoreSchema {
    pub fn new(name: impl Into<String>, version: u32, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            collection: collection.into(),
        }
    }

    /// Reject schemas the store could never open.
    ///
    /// Names end up as file names, so path separators are not allowed.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.version == 0 {
            return Err(TypeError::InvalidSchema("version must be at least 1".into()));
        }
        if self.name.trim().is_empty() {
            return Err(TypeError::InvalidSchema("store name is empty".into()));
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(TypeError::InvalidSchema(format!(
                "store name {:?} is not a valid file name",
                self.name
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(TypeError::InvalidSchema("collection name is empty".into()));
        }
        Ok(())
    }
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_NAME, DEFAULT_STORE_VERSION, DEFAULT_COLLECTION)
    }
}

impl fmt::Display for StoreSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}/{}", self.name, self.version, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema() {
        let schema = StoreSchema::default();
        assert_eq!(schema.name, "Notes");
        assert_eq!(schema.version, 1);
        assert_eq!(schema.collection, "notes");
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn rejects_zero_version_and_blank_names() {
        assert!(StoreSchema::new("Notes", 0, "notes").validate().is_err());
        assert!(StoreSchema::new(" ", 1, "notes").validate().is_err());
        assert!(StoreSchema::new("Notes", 1, "").validate().is_err());
    }

    #[test]
    fn rejects_path_like_names() {
        assert!(StoreSchema::new("../etc", 1, "notes").validate().is_err());
        assert!(StoreSchema::new("..", 1, "notes").validate().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(StoreSchema::default().to_string(), "Notes@v1/notes");
    }
}
