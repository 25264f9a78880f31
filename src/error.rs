use thiserror::Error;

use crate::oid::InvalidOid;
use crate::provider::{StoreError, TransportError};
use crate::refspec::RefspecError;
use crate::remote::RemoteError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no side effects occurred.
    None,
    /// Side effects definitely occurred (locally or remotely).
    Some,
    /// We don't know if side effects occurred.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Crate-level convenience error.
///
/// A thin wrapper over the capability errors; most callers match on
/// [`RemoteError`] directly.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Refspec(#[from] RefspecError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Oid(#[from] InvalidOid),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Refspec(_) | Error::Oid(_) => Transience::Permanent,
            Error::Remote(e) => e.transience(),
            Error::Store(_) => Transience::Unknown,
            Error::Transport(_) => Transience::Retryable,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Refspec(_) | Error::Oid(_) => Effect::None,
            Error::Remote(e) => e.effect(),
            Error::Store(_) | Error::Transport(_) => Effect::Unknown,
        }
    }
}
