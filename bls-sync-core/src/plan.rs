//! Diff planner: upstream entries vs. remote inventory → ordered [`SyncPlan`].
//!
//! The plan is a pure function of its inputs. Uploads and skips come first
//! (in filename order), deletes last (in key order), so an interrupted run
//! never holds fewer files than both snapshots implied.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::key_for;
use crate::contract::{RemoteObject, UpstreamEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadReason {
    New,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SyncAction {
    Upload {
        entry: UpstreamEntry,
        key: String,
        reason: UploadReason,
    },
    Skip {
        filename: String,
        key: String,
    },
    Delete {
        key: String,
    },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            SyncAction::Upload { key, .. }
            | SyncAction::Skip { key, .. }
            | SyncAction::Delete { key } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::Upload { .. } => "upload",
            SyncAction::Skip { .. } => "skip",
            SyncAction::Delete { .. } => "delete",
        }
    }
}

/// Ordered actions for one run. Computed once, then consumed in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn uploads(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Upload { .. }))
    }

    pub fn skips(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Skip { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Delete { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

/// Build the plan for `upstream` against `remote` under `prefix`.
///
/// An empty `upstream` with `delete_enabled` plans deletion of every remote
/// object. Callers decide whether that deserves a warning.
pub fn plan(
    upstream: &[UpstreamEntry],
    remote: &[RemoteObject],
    prefix: &str,
    delete_enabled: bool,
) -> SyncPlan {
    let by_key: HashMap<&str, &RemoteObject> =
        remote.iter().map(|o| (o.key.as_str(), o)).collect();

    // Last occurrence of a filename wins.
    let upstream_sorted: BTreeMap<&str, &UpstreamEntry> = upstream
        .iter()
        .map(|e| (e.filename.as_str(), e))
        .collect();

    let mut actions = Vec::with_capacity(upstream_sorted.len());
    let mut wanted: HashSet<String> = HashSet::with_capacity(upstream_sorted.len());

    for entry in upstream_sorted.into_values() {
        let key = key_for(prefix, &entry.filename);
        let action = match by_key.get(key.as_str()) {
            None => SyncAction::Upload {
                entry: entry.clone(),
                key: key.clone(),
                reason: UploadReason::New,
            },
            Some(existing) if is_changed(entry, existing) => SyncAction::Upload {
                entry: entry.clone(),
                key: key.clone(),
                reason: UploadReason::Changed,
            },
            Some(_) => SyncAction::Skip {
                filename: entry.filename.clone(),
                key: key.clone(),
            },
        };
        actions.push(action);
        wanted.insert(key);
    }

    if delete_enabled {
        let mut stale: Vec<&str> = remote
            .iter()
            .map(|o| o.key.as_str())
            .filter(|k| !wanted.contains(*k))
            .collect();
        stale.sort_unstable();
        stale.dedup();
        actions.extend(stale.into_iter().map(|key| SyncAction::Delete {
            key: key.to_string(),
        }));
    }

    SyncPlan { actions }
}

/// Size decides when it differs. Otherwise the upstream timestamp is compared
/// with the one recorded on the object at upload time: any difference means
/// upstream republished. Objects without a recorded timestamp fall back to
/// comparing against the store's own modification time. With neither size
/// nor a comparable timestamp the file is re-uploaded.
pub fn is_changed(upstream: &UpstreamEntry, remote: &RemoteObject) -> bool {
    if let Some(size) = upstream.size {
        if size != remote.size {
            return true;
        }
    }
    let Some(listed) = upstream.last_modified else {
        return upstream.size.is_none();
    };
    if let Some(recorded) = remote.recorded_upstream_date() {
        return listed != recorded;
    }
    match remote.last_modified {
        Some(stored) => listed > stored,
        None => upstream.size.is_none(),
    }
}
