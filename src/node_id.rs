//! Fixed-size node identity
//!
//! A `NodeId` is the 32-byte Ed25519 public key that identifies a peer on the mesh.
//! Unlike the `Uuid`-backed identifiers elsewhere in this crate's lineage, a `NodeId`
//! is not generated locally — it arrives over the wire and is only ever parsed,
//! hashed, and compared.

use std::fmt;

use thiserror::Error;

/// Errors produced while parsing a [`NodeId`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeIdError {
    /// The hex string did not decode to exactly 32 bytes.
    #[error("node id must be 32 bytes, got {0}")]
    WrongLength(usize),

    /// The input contained non-hex characters.
    #[error("invalid hex in node id: {0}")]
    InvalidHex(String),
}

/// A 32-byte mesh node identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Wrap a raw 32-byte public key.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a node id from its lowercase (or uppercase) hex representation.
    pub fn from_hex(s: &str) -> Result<Self, NodeIdError> {
        let decoded = hex::decode(s).map_err(|e| NodeIdError::InvalidHex(e.to_string()))?;
        let len = decoded.len();
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| NodeIdError::WrongLength(len))?;
        Ok(Self(bytes))
    }

    /// Render the canonical lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The single-byte routing/index hash: the first byte of the identity.
    #[must_use]
    pub const fn hash(&self) -> u8 {
        self.0[0]
    }

    /// Whether `prefix` (1, 2, 4, or 8 bytes) matches the leading bytes of this id.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &[u8]) -> bool {
        prefix.len() <= self.0.len() && self.0[..prefix.len()] == *prefix
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hex_round_trip() {
        let bytes = [7u8; 32];
        let id = NodeId::from_bytes(bytes);
        let hex = id.to_hex();
        assert_eq!(NodeId::from_hex(&hex).unwrap(), id);
    }

    proptest! {
        /// Round-trip: `ParseNodeId(NodeId.hex()) == NodeId`, for any 32 bytes.
        #[test]
        fn hex_round_trip_for_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 32)) {
            let raw: [u8; 32] = bytes.try_into().unwrap();
            let id = NodeId::from_bytes(raw);
            prop_assert_eq!(NodeId::from_hex(&id.to_hex()).unwrap(), id);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            NodeId::from_hex("aabb"),
            Err(NodeIdError::WrongLength(2))
        );
    }

    #[test]
    fn hash_is_first_byte() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        assert_eq!(NodeId::from_bytes(bytes).hash(), 0xAB);
    }

    #[test]
    fn prefix_match() {
        let mut bytes = [0u8; 32];
        bytes[0..4].copy_from_slice(&[1, 2, 3, 4]);
        let id = NodeId::from_bytes(bytes);
        assert!(id.matches_prefix(&[1, 2, 3, 4]));
        assert!(!id.matches_prefix(&[1, 2, 3, 5]));
    }
}
