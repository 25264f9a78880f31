//! Push typestate machine.
//!
//! Connecting → Uploading → AwaitingReport → UpdatingTips, consuming `self`
//! per transition. The push transaction moves through the phases and is
//! dropped on every exit path exactly once; drop is the release.
//!
//! Status scanning is first-error-wins: the first report entry carrying a
//! message terminates the push with `PushRejected` and later entries are
//! not inspected.

use tracing::{debug, info};

use crate::provider::{Connection, PushTransaction, Transport};
use crate::refspec::{Direction, Refspec};
use crate::remote::callbacks::NotifySink;
use crate::remote::error::RemoteError;

struct PushOp<Phase> {
    phase: Phase,
}

/// Initial phase - refspec parsed, nothing contacted.
struct Connecting<'a> {
    url: &'a str,
    refspec: Refspec,
}

/// Connected phase - transaction open, refspec registered.
struct Uploading {
    _conn: Box<dyn Connection>,
    tx: Box<dyn PushTransaction>,
}

/// Uploaded phase - remote unpacked the objects, report pending.
struct AwaitingReport {
    _conn: Box<dyn Connection>,
    tx: Box<dyn PushTransaction>,
}

/// Reported phase - no rejection found, tips left to move.
struct UpdatingTips {
    _conn: Box<dyn Connection>,
    tx: Box<dyn PushTransaction>,
}

impl<'a> PushOp<Connecting<'a>> {
    fn new(url: &'a str, refspec: Refspec) -> Self {
        PushOp {
            phase: Connecting { url, refspec },
        }
    }

    fn connect(self, transport: &mut dyn Transport) -> Result<PushOp<Uploading>, RemoteError> {
        let Connecting { url, refspec } = self.phase;
        let mut conn = transport
            .connect(url, Direction::Push)
            .map_err(RemoteError::TransferFailed)?;
        let mut tx = conn.begin_push().map_err(RemoteError::TransferFailed)?;
        tx.add_refspec(&refspec)
            .map_err(RemoteError::TransferFailed)?;
        debug!(url, refspec = %refspec, "push: transaction open");
        Ok(PushOp {
            phase: Uploading { _conn: conn, tx },
        })
    }
}

impl PushOp<Uploading> {
    /// Upload the pack. An unpack failure stops here; the status report is
    /// never inspected and no tips move.
    fn upload(self) -> Result<PushOp<AwaitingReport>, RemoteError> {
        let Uploading { _conn, mut tx } = self.phase;
        let unpack_ok = tx.finish().map_err(RemoteError::TransferFailed)?;
        if !unpack_ok {
            return Err(RemoteError::UnpackFailed);
        }
        Ok(PushOp {
            phase: AwaitingReport { _conn, tx },
        })
    }
}

impl PushOp<AwaitingReport> {
    /// Scan the per-ref status report in order, first error wins.
    fn scan_report(self, sink: &mut NotifySink<'_>) -> Result<PushOp<UpdatingTips>, RemoteError> {
        let AwaitingReport { _conn, mut tx } = self.phase;
        let report = tx.status().map_err(RemoteError::TransferFailed)?;
        for entry in &report {
            if !sink.notify_push_status(&entry.name, entry.message.as_deref()) {
                return Err(RemoteError::UserAborted);
            }
            if let Some(message) = &entry.message {
                return Err(RemoteError::PushRejected {
                    message: message.clone(),
                });
            }
        }
        debug!(refs = report.len(), "push: report clean");
        Ok(PushOp {
            phase: UpdatingTips { _conn, tx },
        })
    }
}

impl PushOp<UpdatingTips> {
    fn update_tips(self) -> Result<(), RemoteError> {
        let UpdatingTips { _conn, mut tx } = self.phase;
        tx.update_tips().map_err(RemoteError::TipUpdateFailed)?;
        info!("push: complete");
        Ok(())
    }
}

/// Drive a full push of one ad-hoc refspec string.
pub(crate) fn run(
    url: &str,
    refspec: &str,
    transport: &mut dyn Transport,
    sink: &mut NotifySink<'_>,
) -> Result<(), RemoteError> {
    let refspec = Refspec::parse(refspec, Direction::Push)?;
    PushOp::new(url, refspec)
        .connect(transport)?
        .upload()?
        .scan_report(sink)?
        .update_tips()
}
