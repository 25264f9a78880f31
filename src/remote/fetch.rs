//! Fetch typestate machine.
//!
//! Connecting → Negotiating → Transferring → UpdatingTips, each transition
//! consuming `self`. The driver is [`run`]; phases can't be skipped or
//! reordered, enforced at compile time.
//!
//! Any sink handler may abort; the operation then stops with `UserAborted`.
//! Tip updates already applied at that point stay applied — they are
//! written individually and never rolled back.

use bytes::BytesMut;
use tracing::{debug, info};

use crate::oid::ObjectId;
use crate::provider::{AdvertisedRef, Connection, PackSource, Store, Transport};
use crate::refspec::{Direction, Refspec};
use crate::remote::callbacks::{NotifySink, TransferStats};
use crate::remote::error::RemoteError;

/// One advertised remote ref the session will mirror locally.
struct TrackedRef {
    local_name: String,
    new: ObjectId,
}

struct FetchOp<Phase> {
    phase: Phase,
}

/// Initial phase - nothing contacted yet.
struct Connecting<'a> {
    url: &'a str,
    refspecs: &'a [Refspec],
}

/// Connected phase - have the advertised ref list.
struct Connected<'a> {
    refspecs: &'a [Refspec],
    conn: Box<dyn Connection>,
    advertised: Vec<AdvertisedRef>,
}

/// Negotiated phase - know what to track and have a pack stream.
struct Negotiated {
    tracked: Vec<TrackedRef>,
    // The connection owns the stream's lifetime on real transports.
    _conn: Box<dyn Connection>,
    source: Box<dyn PackSource>,
}

/// Transferred phase - pack stored, ready to move tips.
struct Transferred {
    tracked: Vec<TrackedRef>,
    stats: TransferStats,
}

impl<'a> FetchOp<Connecting<'a>> {
    fn new(url: &'a str, refspecs: &'a [Refspec]) -> Self {
        FetchOp {
            phase: Connecting { url, refspecs },
        }
    }

    fn connect(self, transport: &mut dyn Transport) -> Result<FetchOp<Connected<'a>>, RemoteError> {
        let Connecting { url, refspecs } = self.phase;
        let mut conn = transport
            .connect(url, Direction::Fetch)
            .map_err(RemoteError::TransferFailed)?;
        let advertised = conn
            .advertised_refs()
            .map_err(RemoteError::TransferFailed)?;
        debug!(url, refs = advertised.len(), "fetch: connected");
        Ok(FetchOp {
            phase: Connected {
                refspecs,
                conn,
                advertised,
            },
        })
    }
}

impl<'a> FetchOp<Connected<'a>> {
    /// Map advertised refs through the fetch refspecs and ask the remote
    /// for the objects the store is missing.
    fn negotiate(self, store: &impl Store) -> Result<FetchOp<Negotiated>, RemoteError> {
        let Connected {
            refspecs,
            mut conn,
            advertised,
        } = self.phase;

        let mut tracked = Vec::new();
        for remote_ref in &advertised {
            // Ordered refspec list: the first matching refspec wins.
            let Some(spec) = refspecs.iter().find(|s| s.matches_source(&remote_ref.name))
            else {
                continue;
            };
            tracked.push(TrackedRef {
                local_name: spec.transform(&remote_ref.name)?,
                new: remote_ref.oid,
            });
        }

        let mut wants: Vec<ObjectId> = tracked
            .iter()
            .map(|t| t.new)
            .filter(|oid| !store.has_object(*oid))
            .collect();
        wants.sort_unstable();
        wants.dedup();

        let mut haves: Vec<ObjectId> = tracked
            .iter()
            .filter_map(|t| store.ref_target(&t.local_name))
            .filter(|oid| !oid.is_zero())
            .collect();
        haves.sort_unstable();
        haves.dedup();

        debug!(
            tracked = tracked.len(),
            wants = wants.len(),
            haves = haves.len(),
            "fetch: negotiating"
        );
        let source = conn
            .negotiate(&wants, &haves)
            .map_err(RemoteError::TransferFailed)?;

        Ok(FetchOp {
            phase: Negotiated {
                tracked,
                _conn: conn,
                source,
            },
        })
    }
}

impl FetchOp<Negotiated> {
    /// Drain the pack stream into the store, streaming progress to the sink.
    fn transfer(
        self,
        store: &mut impl Store,
        sink: &mut NotifySink<'_>,
    ) -> Result<FetchOp<Transferred>, RemoteError> {
        let Negotiated {
            tracked,
            _conn,
            mut source,
        } = self.phase;

        let mut stats = TransferStats::default();
        let mut pack = BytesMut::new();
        while let Some(chunk) = source.next_chunk().map_err(RemoteError::TransferFailed)? {
            stats.received_bytes += chunk.data.len();
            stats.received_objects += chunk.objects;
            stats.indexed_objects += chunk.objects;
            pack.extend_from_slice(&chunk.data);

            if let Some(text) = &chunk.sideband {
                if !sink.notify_progress(text) {
                    return Err(RemoteError::UserAborted);
                }
            }
            if !sink.notify_transfer(stats) {
                return Err(RemoteError::UserAborted);
            }
        }

        if !pack.is_empty() {
            store
                .write_pack(pack.freeze())
                .map_err(RemoteError::Persistence)?;
        }

        Ok(FetchOp {
            phase: Transferred { tracked, stats },
        })
    }
}

impl FetchOp<Transferred> {
    /// Move each tracked local ref to its advertised tip.
    ///
    /// Updates are applied one at a time: apply, then notify. An abort from
    /// the sink stops before the next ref; nothing is rolled back.
    fn update_tips(
        self,
        store: &mut impl Store,
        sink: &mut NotifySink<'_>,
    ) -> Result<TransferStats, RemoteError> {
        let Transferred { tracked, stats } = self.phase;

        let mut moved = 0usize;
        for t in &tracked {
            let old = store.ref_target(&t.local_name).unwrap_or(ObjectId::ZERO);
            if old == t.new {
                continue;
            }
            store
                .set_ref(&t.local_name, t.new)
                .map_err(RemoteError::Persistence)?;
            moved += 1;
            if !sink.notify_update_tip(&t.local_name, old, t.new) {
                return Err(RemoteError::UserAborted);
            }
        }

        info!(
            moved,
            received_objects = stats.received_objects,
            received_bytes = stats.received_bytes,
            "fetch: complete"
        );
        Ok(stats)
    }
}

/// Drive a full fetch. Blocks until completion or the first failure.
pub(crate) fn run(
    url: &str,
    refspecs: &[Refspec],
    store: &mut impl Store,
    transport: &mut dyn Transport,
    sink: &mut NotifySink<'_>,
) -> Result<TransferStats, RemoteError> {
    FetchOp::new(url, refspecs)
        .connect(transport)?
        .negotiate(store)?
        .transfer(store, sink)?
        .update_tips(store, sink)
}
