//! Collaborator interfaces consumed by a remote session.
//!
//! The session never touches an object database or a socket itself: object
//! and ref storage sit behind [`Store`], wire negotiation and transfer
//! behind [`Transport`]. Both are synchronous, blocking interfaces; any
//! asynchrony lives inside the implementation.

use bytes::Bytes;
use thiserror::Error;

use crate::oid::ObjectId;
use crate::refspec::{Direction, Refspec};
use crate::remote::config::RemoteConfig;

pub mod fs;

pub use fs::FileStore;

/// A ref advertised by the remote side during connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: String,
    pub oid: ObjectId,
}

/// One slice of an incoming packfile.
///
/// `objects` counts the objects completed within this chunk; `sideband`
/// carries server progress text verbatim when present.
#[derive(Clone, Debug, Default)]
pub struct PackChunk {
    pub data: Bytes,
    pub objects: u32,
    pub sideband: Option<String>,
}

/// Per-ref entry of a push status report.
///
/// `message` is `None` for an accepted ref and the rejection reason
/// otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefStatus {
    pub name: String,
    pub message: Option<String>,
}

impl RefStatus {
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
        }
    }

    pub fn rejected(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Some(message.into()),
        }
    }
}

/// Storage-side failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stored data: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

/// Transport-side failure, preserving the provider's error code for
/// diagnostics.
#[derive(Error, Debug)]
#[error("transport error (code {code}): {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Object, ref, and remote-configuration storage.
///
/// A session is bound to exactly one store for its lifetime.
pub trait Store {
    fn has_object(&self, oid: ObjectId) -> bool;

    /// Accept a downloaded packfile.
    fn write_pack(&mut self, pack: Bytes) -> Result<(), StoreError>;

    /// Current target of a local ref, if it exists.
    fn ref_target(&self, name: &str) -> Option<ObjectId>;

    /// Point a local ref at `oid`, creating it if needed.
    fn set_ref(&mut self, name: &str, oid: ObjectId) -> Result<(), StoreError>;

    /// Configuration of a named remote, `None` when not configured.
    fn read_config(&self, remote: &str) -> Result<Option<RemoteConfig>, StoreError>;

    fn write_config(&mut self, remote: &str, config: &RemoteConfig) -> Result<(), StoreError>;

    fn remove_config(&mut self, remote: &str) -> Result<(), StoreError>;
}

/// Opens connections to a remote endpoint.
pub trait Transport {
    fn connect(
        &mut self,
        url: &str,
        direction: Direction,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open connection; alive for the duration of a fetch or push.
pub trait Connection {
    /// Refs the remote side advertised at connect time.
    fn advertised_refs(&mut self) -> Result<Vec<AdvertisedRef>, TransportError>;

    /// Ask for `wants` the local side is missing; `haves` bound the pack.
    fn negotiate(
        &mut self,
        wants: &[ObjectId],
        haves: &[ObjectId],
    ) -> Result<Box<dyn PackSource>, TransportError>;

    /// Open a push transaction on this connection.
    fn begin_push(&mut self) -> Result<Box<dyn PushTransaction>, TransportError>;
}

/// Pull-based packfile stream.
pub trait PackSource {
    /// Next chunk, or `None` once the pack is complete.
    fn next_chunk(&mut self) -> Result<Option<PackChunk>, TransportError>;
}

/// One push, from refspec registration through the status report.
///
/// Dropping the transaction releases it; the session drops it exactly once
/// on every exit path.
pub trait PushTransaction {
    fn add_refspec(&mut self, spec: &Refspec) -> Result<(), TransportError>;

    /// Upload the pack; `Ok(false)` means the remote failed to unpack it.
    fn finish(&mut self) -> Result<bool, TransportError>;

    /// Per-ref status report, in the order the remote reported.
    fn status(&mut self) -> Result<Vec<RefStatus>, TransportError>;

    /// Update remote-tracking tips for the pushed refs.
    fn update_tips(&mut self) -> Result<(), TransportError>;
}
