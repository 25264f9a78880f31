//! Remote session error types.

use thiserror::Error;

use crate::error::{Effect, Transience};
use crate::provider::{StoreError, TransportError};
use crate::refspec::RefspecError;

/// Errors that can occur while configuring or driving a remote session.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RemoteError {
    #[error(transparent)]
    Refspec(#[from] RefspecError),

    #[error("refspec index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error("remote name already in use: {0}")]
    NameConflict(String),

    #[error("invalid configuration for {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("remote configuration storage failed: {0}")]
    Persistence(#[source] StoreError),

    #[error("transfer failed: {0}")]
    TransferFailed(#[source] TransportError),

    #[error("operation aborted by callback")]
    UserAborted,

    #[error("remote failed to unpack objects")]
    UnpackFailed,

    #[error("push rejected: {message}")]
    PushRejected { message: String },

    #[error("failed to update remote-tracking tips: {0}")]
    TipUpdateFailed(#[source] TransportError),
}

impl RemoteError {
    /// Whether retrying the operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            RemoteError::TransferFailed(_)
            | RemoteError::UserAborted
            | RemoteError::UnpackFailed
            | RemoteError::PushRejected { .. }
            | RemoteError::TipUpdateFailed(_) => Transience::Retryable,

            RemoteError::Refspec(_)
            | RemoteError::IndexOutOfRange { .. }
            | RemoteError::RemoteNotFound(_)
            | RemoteError::NameConflict(_)
            | RemoteError::Config { .. } => Transience::Permanent,

            RemoteError::Persistence(_) => Transience::Unknown,
        }
    }

    /// What we know about side effects when this error is returned.
    pub fn effect(&self) -> Effect {
        match self {
            // Validation fails before anything is touched.
            RemoteError::Refspec(_)
            | RemoteError::IndexOutOfRange { .. }
            | RemoteError::RemoteNotFound(_)
            | RemoteError::NameConflict(_)
            | RemoteError::Config { .. } => Effect::None,

            // Rejected pushes uploaded a pack.
            RemoteError::UnpackFailed
            | RemoteError::PushRejected { .. }
            | RemoteError::TipUpdateFailed(_) => Effect::Some,

            // An abort can land before any transfer or after some tip
            // updates already applied.
            RemoteError::UserAborted
            | RemoteError::Persistence(_)
            | RemoteError::TransferFailed(_) => Effect::Unknown,
        }
    }
}
