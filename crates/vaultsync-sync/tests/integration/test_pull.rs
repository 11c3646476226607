//! Pull: applying the incremental remote feed to the local vault

use vaultsync_core::domain::{EntryKind, SyncState};
use vaultsync_core::ports::{AuthStatus, PersistedState};
use vaultsync_sync::engine::NEED_CLONING;
use vaultsync_sync::SyncError;

use crate::common::{self, file_entry, index_of, remote_deleted, remote_folder, remote_item};

#[tokio::test]
async fn test_pull_downloads_creates_and_deletes() {
    let h = common::synced_harness(index_of(vec![file_entry("notes/x.md", 50, 1)])).await;
    common::write_local(h.dir.path(), "notes/x.md", b"x", 50);

    h.remote.serve("id-a", b"hello");
    h.remote.push_feed(
        vec![
            remote_deleted("id-x", "notes", "x.md"),
            remote_item("id-a", "", "a.md", 1_000),
            remote_folder("id-d", "", "docs", 900),
        ],
        "c1",
    );

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.downloaded, 2);
    assert_eq!(report.deleted, 1);
    assert!(report.failed.is_empty());

    assert_eq!(h.read("a.md").as_deref(), Some(&b"hello"[..]));
    assert!(h.path("docs").is_dir());
    assert!(!h.path("notes/x.md").exists());

    // The deleted item never triggers a download
    assert_eq!(h.remote.logged("download"), vec!["download a.md".to_string()]);

    let state = h.store.snapshot();
    assert_eq!(state.cursor.unwrap().as_str(), "c1");
    assert!(state.remote_index.contains_key("a.md"));
    assert_eq!(state.remote_index["docs"].kind, EntryKind::Folder);
    assert!(!state.remote_index.contains_key("notes/x.md"));

    assert!(h.sink.saw("Handled (3/3)"));
    assert!(h.sink.saw("Finished pulling"));
}

#[tokio::test]
async fn test_pull_sets_local_mtime_so_next_diff_is_clean() {
    let h = common::synced_harness(Default::default()).await;
    h.remote.serve("id-a", b"hello");
    h.remote
        .push_feed(vec![remote_item("id-a", "sub", "a.md", 1_234_567)], "c1");

    h.engine.pull().await.unwrap();

    let meta = std::fs::metadata(h.path("sub/a.md")).unwrap();
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    assert_eq!(mtime.unix_seconds(), 1_234);
    assert_eq!(mtime.nanoseconds(), 567_000_000);

    // Only the implicitly created parent folder is new locally
    let (uploads, deletions) = h.engine.rebuild_diff().await.unwrap();
    assert_eq!((uploads, deletions), (1, 0));
    let pending = h.engine.pending().await.unwrap();
    assert!(pending.to_upload().contains_key("sub"));
}

#[tokio::test]
async fn test_pull_missing_delta_link_keeps_cursor() {
    let h = common::synced_harness(Default::default()).await;
    h.remote
        .push_feed_error("Delta response had neither nextLink nor deltaLink");

    let err = h.engine.pull().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert_eq!(h.store.snapshot().cursor.unwrap().as_str(), "c0");
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.engine.state(), SyncState::Idle);
}

#[tokio::test]
async fn test_pull_failure_after_sign_out_is_auth_error() {
    let h = common::synced_harness(Default::default()).await;
    h.remote.push_feed_error("401 Unauthorized");
    h.remote.hold_listing.store(true, std::sync::atomic::Ordering::SeqCst);

    let auth = h.auth.clone();
    let remote = h.remote.clone();
    let expire = async move {
        remote.entered.notified().await;
        auth.set(AuthStatus::Expired);
        remote.release.notify_one();
    };
    let (result, ()) = tokio::join!(h.engine.pull(), expire);

    assert!(matches!(result.unwrap_err(), SyncError::Auth(_)));
    assert_eq!(h.store.snapshot().cursor.unwrap().as_str(), "c0");
}

#[tokio::test]
async fn test_pull_keeps_newer_local_edit() {
    let h = common::synced_harness(index_of(vec![file_entry("a.md", 100_000, 6)])).await;
    common::write_local(h.dir.path(), "a.md", b"local!", 500_000);

    h.remote.serve("id-a", b"remote");
    h.remote
        .push_feed(vec![remote_item("id-a", "", "a.md", 300_000)], "c1");

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.downloaded, 0);
    assert_eq!(h.read("a.md").as_deref(), Some(&b"local!"[..]));
    assert!(h.remote.logged("download").is_empty());

    // Still owed to the remote
    let pending = h.engine.pending().await.unwrap();
    assert!(pending.to_upload().contains_key("a.md"));
}

#[tokio::test]
async fn test_pull_strictly_newer_remote_wins_over_local_edit() {
    let h = common::synced_harness(index_of(vec![file_entry("a.md", 100_000, 6)])).await;
    common::write_local(h.dir.path(), "a.md", b"local!", 200_000);

    h.remote.serve("id-a", b"remote");
    h.remote
        .push_feed(vec![remote_item("id-a", "", "a.md", 300_000)], "c1");

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(h.read("a.md").as_deref(), Some(&b"remote"[..]));
    let pending = h.engine.pending().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_pull_skips_ignored_and_foreign_items() {
    let state = PersistedState {
        cursor: Some(common::cursor("c0")),
        remote_index: Default::default(),
        ignore_patterns: vec![r"\.git".to_string()],
    };
    let h = common::harness_with(state, AuthStatus::Authenticated).await;
    h.remote.serve("id-g", b"[core]");
    let mut foreign = remote_item("id-f", "", "other.md", 1_000);
    foreign.parent_path = Some("/drive/root:/Apps/VaultSync/Elsewhere".to_string());

    h.remote.push_feed(
        vec![
            remote_item("id-g", ".git", "config", 1_000),
            remote_item("id-s", "sub/.git", "x", 1_000),
            foreign,
        ],
        "c1",
    );

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.skipped, 3);
    assert!(!h.path(".git").exists());
    assert!(!h.path("sub").exists());
    assert!(h.remote.logged("download").is_empty());
}

#[tokio::test]
async fn test_pull_download_failure_is_isolated() {
    let h = common::synced_harness(Default::default()).await;
    h.remote.serve("id-ok", b"ok");
    h.remote.push_feed(
        vec![
            remote_item("id-missing", "", "broken.md", 1_000),
            remote_item("id-ok", "", "fine.md", 1_000),
        ],
        "c1",
    );

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.failed, vec!["broken.md".to_string()]);
    assert_eq!(report.downloaded, 1);
    let state = h.store.snapshot();
    assert!(state.remote_index.contains_key("fine.md"));
    assert!(!state.remote_index.contains_key("broken.md"));
    assert_eq!(state.cursor.unwrap().as_str(), "c1");
}

#[tokio::test]
async fn test_pull_failed_local_removal_stays_known() {
    let h = common::synced_harness(index_of(vec![file_entry("notes/x.md", 50, 1)])).await;
    common::write_local(h.dir.path(), "notes/x.md", b"x", 50);
    h.vault
        .fail_removes
        .lock()
        .unwrap()
        .insert("notes/x.md".to_string());
    h.remote
        .push_feed(vec![remote_deleted("id-x", "notes", "x.md")], "c1");

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, vec!["notes/x.md".to_string()]);
    assert!(h.path("notes/x.md").exists());
    assert!(h.store.snapshot().remote_index.contains_key("notes/x.md"));

    // The surviving local copy is not mistaken for a new file
    h.engine.push().await.unwrap();
    assert!(h.remote.logged("upload").is_empty());
}

#[tokio::test]
async fn test_pull_without_cursor_is_refused() {
    let h = common::harness_with(PersistedState::default(), AuthStatus::Authenticated).await;

    let report = h.engine.pull().await.unwrap();

    assert_eq!(report.refused.as_deref(), Some(NEED_CLONING));
    assert_eq!(h.remote.call_count(), 0);
    assert!(h.sink.saw(NEED_CLONING));
}
