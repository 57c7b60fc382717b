use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A process-unique token naming a synthesized handler binding.
///
/// Rendered dash-free with a leading `__` so the same token can serve as the
/// exported binding name inside the synthesized script and as the suffix of
/// the artifact filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyntheticId(Uuid);

impl SyntheticId {
    /// Generate a new random ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for SyntheticId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("__").unwrap_or(s);
        Ok(Self(Uuid::parse_str(raw)?))
    }
}

impl fmt::Display for SyntheticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__{}", self.0.simple())
    }
}

/// A token pairing a request with its eventual reply on a worker channel.
///
/// Unique among all requests currently pending on the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let id1 = SyntheticId::generate();
        let id2 = SyntheticId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_synthetic_id_is_js_identifier() {
        let id = SyntheticId::generate().to_string();
        assert!(id.starts_with("__"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_parse_and_display() {
        let id = SyntheticId::generate();
        let parsed = SyntheticId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_correlation_id_serialization() {
        let id = CorrelationId::generate();
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: CorrelationId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}
