//! Diff engine
//!
//! Compares the local index with the last-synced remote snapshot.
//!
//! - [`diff_full`] recomputes the whole [`DiffSet`]; run on startup, after
//!   a clone and whenever the ignore rules change.
//! - [`apply_change`] adjusts an existing set for one local change, fed by
//!   the file watcher.
//!
//! Equal modification times mean "already in sync". Folders carry no
//! content, so a folder is only uploaded when the remote does not know it.

use vaultsync_core::domain::{DiffSet, IgnoreRuleSet, IndexEntry, IndexSnapshot};

/// One local change, already resolved against the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalChange {
    /// The entry was created or modified
    Upserted(IndexEntry),
    /// Nothing exists at the path any more
    Removed(String),
    /// The entry moved; `to` is `None` when the destination vanished again
    Renamed { from: String, to: Option<IndexEntry> },
}

fn needs_upload(entry: &IndexEntry, remote: &IndexSnapshot) -> bool {
    match remote.get(&entry.path) {
        None => true,
        Some(_) if entry.is_folder() => false,
        Some(known) => !entry.same_mtime(known),
    }
}

/// Recompute the pending work from scratch
pub fn diff_full(local: &IndexSnapshot, remote: &IndexSnapshot, rules: &IgnoreRuleSet) -> DiffSet {
    let mut diff = DiffSet::new();

    for (path, entry) in local {
        if rules.is_ignored(path) {
            continue;
        }
        if needs_upload(entry, remote) {
            diff.upsert_upload(entry.clone());
        }
    }

    for path in remote.keys() {
        if rules.is_ignored(path) || local.contains_key(path) {
            continue;
        }
        diff.mark_delete(path.clone());
    }

    diff
}

/// Apply one local change to `diff`
pub fn apply_change(
    diff: &mut DiffSet,
    remote: &IndexSnapshot,
    rules: &IgnoreRuleSet,
    change: LocalChange,
) {
    match change {
        LocalChange::Upserted(entry) => record_upsert(diff, remote, rules, entry),
        LocalChange::Removed(path) => record_removal(diff, remote, rules, &path),
        LocalChange::Renamed { from, to } => {
            record_removal(diff, remote, rules, &from);
            if let Some(entry) = to {
                record_upsert(diff, remote, rules, entry);
            }
        }
    }
}

fn record_upsert(
    diff: &mut DiffSet,
    remote: &IndexSnapshot,
    rules: &IgnoreRuleSet,
    entry: IndexEntry,
) {
    if rules.is_ignored(&entry.path) {
        return;
    }
    if needs_upload(&entry, remote) {
        diff.upsert_upload(entry);
    } else {
        // Back to the remote's version: nothing owed either way.
        diff.forget(&entry.path);
    }
}

/// A removed folder takes its subtree with it
fn record_removal(diff: &mut DiffSet, remote: &IndexSnapshot, rules: &IgnoreRuleSet, path: &str) {
    if rules.is_ignored(path) {
        return;
    }

    let prefix = format!("{path}/");
    let pending: Vec<String> = diff
        .to_upload()
        .keys()
        .filter(|p| p.as_str() == path || p.starts_with(&prefix))
        .cloned()
        .collect();
    for p in pending {
        diff.remove_upload(&p);
    }

    let known: Vec<String> = remote
        .keys()
        .filter(|p| p.as_str() == path || p.starts_with(&prefix))
        .filter(|p| !rules.is_ignored(p))
        .cloned()
        .collect();
    for p in known {
        diff.mark_delete(p);
    }
}
