//! Object identifiers.
//!
//! Fixed-width ids as handed to us by the storage and transport
//! collaborators. We never hash anything ourselves; the object database
//! behind the [`Store`](crate::provider::Store) trait owns that.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const OID_LEN: usize = 20;
const OID_HEX_LEN: usize = 40;

/// Raw object id (20 bytes, rendered as 40 hex chars).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OID_LEN]);

/// An id string that is not 40 hex characters.
#[derive(Error, Debug)]
#[error("invalid object id {raw:?}: {reason}")]
pub struct InvalidOid {
    pub raw: String,
    pub reason: String,
}

impl ObjectId {
    /// The all-zero id, used as "ref did not exist" in tip updates.
    pub const ZERO: ObjectId = ObjectId([0u8; OID_LEN]);

    pub fn from_bytes(bytes: [u8; OID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex: &str) -> Result<Self, InvalidOid> {
        if hex.len() != OID_HEX_LEN {
            return Err(InvalidOid {
                raw: hex.to_string(),
                reason: format!("expected {} hex chars, got {}", OID_HEX_LEN, hex.len()),
            });
        }
        let bytes = hex::decode(hex).map_err(|e| InvalidOid {
            raw: hex.to_string(),
            reason: e.to_string(),
        })?;
        let mut out = [0u8; OID_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; OID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; OID_LEN]
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidOid;

    fn from_str(s: &str) -> Result<Self, InvalidOid> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
