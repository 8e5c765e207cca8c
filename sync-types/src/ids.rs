//! Identity types for docsync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SyncError;

/// Identifies the replica (actor) that authored a change.
///
/// Opaque bytes, displayed as lowercase hex. Freshly generated identifiers
/// are 16 random bytes; identifiers received from other replicas may have
/// any length.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId(Vec<u8>);

impl ReplicaId {
    /// Create a new random ReplicaId.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes.to_vec())
    }

    /// Create a ReplicaId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Get the raw bytes of this ReplicaId.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_string();
        write!(f, "ReplicaId({})", &hex[..hex.len().min(8)])
    }
}

impl FromStr for ReplicaId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidData(format!("replica id: {e}")))
    }
}
