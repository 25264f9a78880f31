//! Remote sessions.
//!
//! Provides:
//! - Session bound to a store, with ordered fetch/push refspec lists
//! - Fetch typestate machine (Connecting → Negotiating → Transferring → UpdatingTips)
//! - Push typestate machine with first-error-wins status scanning
//! - NotifySink, the pluggable progress/update-tip/push-status callback set

pub mod callbacks;
pub mod config;
pub mod error;
mod fetch;
mod push;
pub mod session;

pub use callbacks::{NotifySink, TransferStats};
pub use config::RemoteConfig;
pub use error::RemoteError;
pub use session::{default_fetch_refspec, Session};
