use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of actions the persistence core understands.
///
/// Names on the wire are camelCase (`getAll`), matching what UI
/// collaborators publish. Anything else is rejected with
/// [`TypeError::UnknownOperation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Open the store, creating or upgrading the collection.
    Init,
    /// Insert a new note; fails if the key already exists.
    Add,
    /// Insert or fully replace a note.
    Put,
    /// Point lookup by key.
    Get,
    /// Full ordered scan of the collection.
    GetAll,
    /// Remove a note; removing an absent key succeeds.
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Self::Init,
        Self::Add,
        Self::Put,
        Self::Get,
        Self::GetAll,
        Self::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Add => "add",
            Self::Put => "put",
            Self::Get => "get",
            Self::GetAll => "getAll",
            Self::Delete => "delete",
        }
    }

    /// Returns `true` for operations that write to the collection.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Add | Self::Put | Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| TypeError::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn serde_names_match_as_str() {
        for op in Operation::ALL {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            "initDb".parse::<Operation>(),
            Err(TypeError::UnknownOperation("initDb".into()))
        );
        assert!("".parse::<Operation>().is_err());
        assert!("GetAll".parse::<Operation>().is_err());
    }

    #[test]
    fn mutating_operations() {
        assert!(Operation::Add.is_mutating());
        assert!(Operation::Delete.is_mutating());
        assert!(!Operation::Get.is_mutating());
        assert!(!Operation::Init.is_mutating());
    }
}
