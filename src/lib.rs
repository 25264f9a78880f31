#![forbid(unsafe_code)]

//! Refspec engine and remote-transport session manager.
//!
//! Object storage and wire I/O sit behind the [`provider`] traits;
//! everything here is synchronous and blocking. [`remote::Session`] is the
//! entry point.

pub mod error;
pub mod oid;
pub mod provider;
pub mod refspec;
pub mod remote;
pub mod test_harness;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the main surface at the crate root for convenience
pub use crate::oid::ObjectId;
pub use crate::refspec::{Direction, Refspec, RefspecError};
pub use crate::remote::{NotifySink, RemoteConfig, RemoteError, Session, TransferStats};
