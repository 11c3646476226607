//! Admission: sign-in checks, the single-operation guard and missing cursors

use std::sync::atomic::Ordering;

use vaultsync_core::domain::SyncState;
use vaultsync_core::ports::{AuthStatus, PersistedState};
use vaultsync_sync::engine::{OPERATION_IN_PROGRESS, SIGN_IN_REQUIRED};
use vaultsync_sync::SyncError;

use crate::common;

#[tokio::test]
async fn test_signed_out_refuses_every_operation() {
    let state = PersistedState {
        cursor: Some(common::cursor("c0")),
        ..PersistedState::default()
    };
    let h = common::harness_with(state, AuthStatus::NotAuthenticated).await;
    common::write_local(h.dir.path(), "a.md", b"a", 1_000);

    let reports = vec![
        h.engine.pull().await.unwrap(),
        h.engine.push().await.unwrap(),
        h.engine.sync().await.unwrap(),
        h.engine.clone_to_local().await.unwrap(),
        h.engine.clone_to_remote().await.unwrap(),
    ];

    for report in reports {
        assert_eq!(report.refused.as_deref(), Some(SIGN_IN_REQUIRED));
    }
    assert_eq!(h.remote.call_count(), 0);
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.sink.messages().len(), 5);
    assert!(h.sink.saw(SIGN_IN_REQUIRED));
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert!(h.path("a.md").exists());
}

#[tokio::test]
async fn test_expired_session_is_refused() {
    let h = common::synced_harness(Default::default()).await;
    h.auth.set(AuthStatus::Expired);

    let report = h.engine.push().await.unwrap();

    assert!(report.is_refused());
    assert_eq!(h.remote.call_count(), 0);
}

#[tokio::test]
async fn test_refreshable_session_is_allowed() {
    let h = common::synced_harness(Default::default()).await;
    h.auth.set(AuthStatus::ExpiredRefreshable);
    h.remote.push_feed(Vec::new(), "c1");

    let report = h.engine.pull().await.unwrap();

    assert!(!report.is_refused());
    assert_eq!(h.store.snapshot().cursor.unwrap().as_str(), "c1");
}

#[tokio::test]
async fn test_second_operation_is_refused_while_busy() {
    let h = common::synced_harness(Default::default()).await;
    h.remote.hold_listing.store(true, Ordering::SeqCst);
    h.remote.push_feed(Vec::new(), "c1");

    let contender = async {
        h.remote.entered.notified().await;
        let busy = h.engine.state();
        let second = h.engine.pull().await.unwrap();
        let clone = h.engine.clone_to_remote().await.unwrap();
        let rebuild = h.engine.rebuild_diff().await;
        let status = h.engine.status().await.unwrap();
        h.remote.release.notify_one();
        (busy, second, clone, rebuild, status)
    };
    let (first, (busy, second, clone, rebuild, status)) =
        tokio::join!(h.engine.pull(), contender);

    assert_eq!(busy, SyncState::Busy);
    assert_eq!(status.state, SyncState::Busy);
    assert_eq!(second.refused.as_deref(), Some(OPERATION_IN_PROGRESS));
    assert_eq!(clone.refused.as_deref(), Some(OPERATION_IN_PROGRESS));
    match rebuild {
        Err(SyncError::Precondition(reason)) => assert_eq!(reason, OPERATION_IN_PROGRESS),
        other => panic!("unexpected rebuild result: {other:?}"),
    }
    assert!(h.sink.saw(OPERATION_IN_PROGRESS));

    // The refused operations left no trace on the remote
    assert_eq!(h.remote.log(), vec!["incremental_listing c0".to_string()]);

    assert!(!first.unwrap().is_refused());
    assert_eq!(h.engine.state(), SyncState::Idle);
    assert_eq!(h.store.snapshot().cursor.unwrap().as_str(), "c1");
}

#[tokio::test]
async fn test_guard_released_after_failure() {
    let h = common::synced_harness(Default::default()).await;
    h.remote.push_feed_error("connection reset");
    h.remote.push_feed(Vec::new(), "c1");

    assert!(h.engine.pull().await.is_err());
    assert_eq!(h.engine.state(), SyncState::Idle);

    let report = h.engine.pull().await.unwrap();
    assert!(!report.is_refused());
}

#[tokio::test]
async fn test_status_reports_pending_work() {
    let h =
        common::synced_harness(common::index_of(vec![common::file_entry("gone.md", 1, 1)])).await;
    common::write_local(h.dir.path(), "new.md", b"n", 1_000);

    let before = h.engine.status().await.unwrap();
    assert_eq!(before.pending, None);
    assert!(before.has_cursor);
    assert_eq!(before.remote_entries, 1);
    assert_eq!(before.auth, AuthStatus::Authenticated);
    assert_eq!(before.ignore_patterns, vec![r"\.vaultsync".to_string()]);

    h.engine.rebuild_diff().await.unwrap();

    let after = h.engine.status().await.unwrap();
    assert_eq!(after.pending, Some((1, 1)));
    assert_eq!(after.state, SyncState::Idle);
}
