//! End-to-end session tests over the in-memory harness.

use std::cell::RefCell;

use refsync::provider::{RefStatus, Store};
use refsync::remote::RemoteError;
use refsync::test_harness::{oid, MemoryStore, ScriptedTransport};
use refsync::{Direction, NotifySink, ObjectId, Session};

fn origin(store: MemoryStore) -> Session<MemoryStore> {
    let mut session = Session::in_memory(store, "origin", "https://example.com/repo.git").unwrap();
    session
        .set_fetch_refspecs(["+refs/heads/*:refs/remotes/origin/*"])
        .unwrap();
    session
}

// =============================================================================
// Fetch
// =============================================================================

#[test]
fn fetch_downloads_updates_tips_and_aggregates_stats() {
    let mut transport = ScriptedTransport::new()
        .advertise("refs/heads/main", oid(1))
        .advertise("refs/heads/dev", oid(2))
        .advertise("refs/tags/v1", oid(9)) // no refspec matches, ignored
        .sideband_chunk(b"PACKaaaa", 2, "counting objects: 2")
        .chunk(b"bbbb", 1);

    let mut session = origin(MemoryStore::new());
    let progress = RefCell::new(Vec::new());
    let tips = RefCell::new(Vec::new());
    let mut sink = NotifySink::new();
    sink.progress(|text| {
        progress.borrow_mut().push(text.to_string());
        true
    });
    sink.update_tip(|name, old, new| {
        tips.borrow_mut().push((name.to_string(), old, new));
        true
    });

    let stats = session.fetch(&mut transport, &mut sink).unwrap();
    drop(sink);

    assert_eq!(stats.received_bytes, 12);
    assert_eq!(stats.received_objects, 3);
    assert_eq!(stats.indexed_objects, 3);
    assert_eq!(session.stats(), stats, "snapshot overwritten on success");

    assert_eq!(progress.borrow().as_slice(), ["counting objects: 2"]);
    assert_eq!(
        tips.borrow().as_slice(),
        [
            ("refs/remotes/origin/main".to_string(), ObjectId::ZERO, oid(1)),
            ("refs/remotes/origin/dev".to_string(), ObjectId::ZERO, oid(2)),
        ]
    );

    let store = session.store();
    assert_eq!(store.ref_target("refs/remotes/origin/main"), Some(oid(1)));
    assert_eq!(store.ref_target("refs/remotes/origin/dev"), Some(oid(2)));
    assert_eq!(store.ref_target("refs/tags/v1"), None);
    assert_eq!(store.packs().len(), 1);
    assert_eq!(&store.packs()[0][..], b"PACKaaaabbbb");

    let log = transport.log();
    assert_eq!(
        log.connects,
        [("https://example.com/repo.git".to_string(), Direction::Fetch)]
    );
    // Both matched tips are missing, the tag is not wanted.
    assert_eq!(log.wants.len(), 2);
    assert!(log.wants.contains(&oid(1)) && log.wants.contains(&oid(2)));
}

#[test]
fn fetch_wants_only_missing_objects_and_reports_haves() {
    let mut store = MemoryStore::new();
    store.insert_object(oid(1));
    store.put_ref("refs/remotes/origin/main", oid(7));

    let mut transport = ScriptedTransport::new()
        .advertise("refs/heads/main", oid(1))
        .advertise("refs/heads/dev", oid(2));

    let mut session = origin(store);
    let mut sink = NotifySink::new();
    session.fetch(&mut transport, &mut sink).unwrap();

    let log = transport.log();
    assert_eq!(log.wants, [oid(2)], "already-present tip is not wanted");
    assert_eq!(log.haves, [oid(7)], "current local target is a have");
}

#[test]
fn fetch_skips_unchanged_refs() {
    let mut store = MemoryStore::new();
    store.insert_object(oid(1));
    store.put_ref("refs/remotes/origin/main", oid(1));

    let mut transport = ScriptedTransport::new().advertise("refs/heads/main", oid(1));
    let mut session = origin(store);

    let tips = RefCell::new(0usize);
    let mut sink = NotifySink::new();
    sink.update_tip(|_, _, _| {
        *tips.borrow_mut() += 1;
        true
    });
    session.fetch(&mut transport, &mut sink).unwrap();
    drop(sink);
    assert_eq!(*tips.borrow(), 0);
}

#[test]
fn fetch_abort_in_update_tip_stops_before_the_next_ref() {
    let mut transport = ScriptedTransport::new()
        .advertise("refs/heads/a", oid(1))
        .advertise("refs/heads/b", oid(2))
        .advertise("refs/heads/c", oid(3));

    let mut session = origin(MemoryStore::new());
    let calls = RefCell::new(Vec::new());
    let mut sink = NotifySink::new();
    sink.update_tip(|name, _, _| {
        calls.borrow_mut().push(name.to_string());
        // Signal abort from the second invocation.
        calls.borrow().len() < 2
    });

    let err = session.fetch(&mut transport, &mut sink).unwrap_err();
    drop(sink);
    assert!(matches!(err, RemoteError::UserAborted));

    // Two invocations happened, the third never did.
    assert_eq!(
        calls.borrow().as_slice(),
        ["refs/remotes/origin/a", "refs/remotes/origin/b"]
    );

    // Applied updates stay applied; the third ref was never touched.
    let store = session.store();
    assert_eq!(store.ref_target("refs/remotes/origin/a"), Some(oid(1)));
    assert_eq!(store.ref_target("refs/remotes/origin/b"), Some(oid(2)));
    assert_eq!(store.ref_target("refs/remotes/origin/c"), None);

    // A failed fetch leaves the previous stats snapshot in place.
    assert_eq!(session.stats().received_objects, 0);
}

#[test]
fn fetch_abort_in_transfer_progress_applies_no_tips() {
    let mut transport = ScriptedTransport::new()
        .advertise("refs/heads/main", oid(1))
        .chunk(b"PACK", 1);

    let mut session = origin(MemoryStore::new());
    let mut sink = NotifySink::new();
    sink.transfer_progress(|_| false);

    let err = session.fetch(&mut transport, &mut sink).unwrap_err();
    assert!(matches!(err, RemoteError::UserAborted));
    assert_eq!(session.store().ref_target("refs/remotes/origin/main"), None);
    assert!(session.store().packs().is_empty());
}

#[test]
fn fetch_connect_failure_is_transfer_failed() {
    let mut transport = ScriptedTransport::new();
    transport.fail_connect = true;

    let mut session = origin(MemoryStore::new());
    let mut sink = NotifySink::new();
    let err = session.fetch(&mut transport, &mut sink).unwrap_err();
    match err {
        RemoteError::TransferFailed(source) => assert_eq!(source.code, -1),
        other => panic!("expected TransferFailed, got {other:?}"),
    }
}

// =============================================================================
// Push
// =============================================================================

#[test]
fn push_success_updates_tips_and_releases_the_transaction() {
    let mut transport = ScriptedTransport::new().status(RefStatus::ok("refs/heads/main"));

    let mut session = origin(MemoryStore::new());
    session.set_push_url("ssh://git@example.com/repo.git").unwrap();
    let mut sink = NotifySink::new();
    session
        .push(&mut transport, "refs/heads/main:refs/heads/main", &mut sink)
        .unwrap();

    let log = transport.log();
    assert_eq!(
        log.connects,
        [("ssh://git@example.com/repo.git".to_string(), Direction::Push)]
    );
    assert_eq!(log.refspecs_added, ["refs/heads/main:refs/heads/main"]);
    assert!(log.tips_updated);
    assert_eq!(log.transactions_opened, 1);
    assert_eq!(log.transactions_dropped, 1);
}

#[test]
fn push_rejects_malformed_adhoc_refspec() {
    let mut transport = ScriptedTransport::new();
    let mut session = origin(MemoryStore::new());
    let mut sink = NotifySink::new();
    let err = session
        .push(&mut transport, "nocolon", &mut sink)
        .unwrap_err();
    assert!(matches!(err, RemoteError::Refspec(_)));
    assert!(transport.log().connects.is_empty(), "parse fails before I/O");
}

#[test]
fn push_unpack_failure_stops_before_the_report() {
    let mut transport = ScriptedTransport::new()
        .status(RefStatus::rejected("refs/heads/main", "should not be read"));
    transport.unpack_ok = false;

    let mut session = origin(MemoryStore::new());
    let statuses = RefCell::new(0usize);
    let mut sink = NotifySink::new();
    sink.push_status(|_, _| {
        *statuses.borrow_mut() += 1;
        true
    });
    sink.update_tip(|_, _, _| panic!("no tip updates on unpack failure"));

    let err = session
        .push(&mut transport, "refs/heads/main:refs/heads/main", &mut sink)
        .unwrap_err();
    drop(sink);
    assert!(matches!(err, RemoteError::UnpackFailed));
    assert_eq!(*statuses.borrow(), 0, "report never inspected");

    let log = transport.log();
    assert!(!log.tips_updated);
    assert_eq!(log.transactions_dropped, 1);
}

#[test]
fn push_first_rejection_wins_and_stops_the_scan() {
    let mut transport = ScriptedTransport::new()
        .status(RefStatus::ok("refs/heads/a"))
        .status(RefStatus::rejected("refs/heads/main", "non-fast-forward"))
        .status(RefStatus::rejected("refs/heads/b", "never inspected"));

    let mut session = origin(MemoryStore::new());
    let seen = RefCell::new(Vec::new());
    let mut sink = NotifySink::new();
    sink.push_status(|name, message| {
        seen.borrow_mut()
            .push((name.to_string(), message.map(str::to_string)));
        true
    });

    let err = session
        .push(&mut transport, "refs/heads/main:refs/heads/main", &mut sink)
        .unwrap_err();
    drop(sink);
    match err {
        RemoteError::PushRejected { message } => assert_eq!(message, "non-fast-forward"),
        other => panic!("expected PushRejected, got {other:?}"),
    }

    assert_eq!(
        seen.borrow().as_slice(),
        [
            ("refs/heads/a".to_string(), None),
            (
                "refs/heads/main".to_string(),
                Some("non-fast-forward".to_string())
            ),
        ]
    );

    let log = transport.log();
    assert!(!log.tips_updated, "tips are not updated after a rejection");
    assert_eq!(log.transactions_dropped, 1);
}

#[test]
fn push_status_handler_can_abort() {
    let mut transport = ScriptedTransport::new().status(RefStatus::ok("refs/heads/main"));

    let mut session = origin(MemoryStore::new());
    let mut sink = NotifySink::new();
    sink.push_status(|_, _| false);
    let err = session
        .push(&mut transport, "refs/heads/main:refs/heads/main", &mut sink)
        .unwrap_err();
    assert!(matches!(err, RemoteError::UserAborted));
    assert_eq!(transport.log().transactions_dropped, 1);
}

#[test]
fn push_tip_update_failure_is_its_own_error() {
    let mut transport = ScriptedTransport::new().status(RefStatus::ok("refs/heads/main"));
    transport.fail_update_tips = true;

    let mut session = origin(MemoryStore::new());
    let mut sink = NotifySink::new();
    let err = session
        .push(&mut transport, "refs/heads/main:refs/heads/main", &mut sink)
        .unwrap_err();
    match err {
        RemoteError::TipUpdateFailed(source) => assert_eq!(source.code, -16),
        other => panic!("expected TipUpdateFailed, got {other:?}"),
    }
    assert_eq!(transport.log().transactions_dropped, 1);
}
