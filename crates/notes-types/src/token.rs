use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of one outstanding request (UUID v7, time-ordered).
///
/// Minted by the coordinator, carried through the worker unchanged, and used
/// to pair each result with the request that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(uuid::Uuid);

impl CorrelationToken {
    /// Mint a fresh token.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// First 8 characters, for log lines.
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationToken({})", self.short_id())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = CorrelationToken::new();
        let b = CorrelationToken::new();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_uuid_string() {
        let token = CorrelationToken::new();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{token}\""));
        let back: CorrelationToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn short_id_is_prefix() {
        let token = CorrelationToken::new();
        assert!(token.to_string().starts_with(&token.short_id()));
        assert_eq!(token.short_id().len(), 8);
    }
}
