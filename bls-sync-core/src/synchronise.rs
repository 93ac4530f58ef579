//! High-level pipeline: orchestrates listing → inventory → plan → execute.
//!
//! This module sequences one sync run:
//!   - Fetches and parses the upstream directory listing
//!   - Reads the remote inventory under the configured prefix, plus the
//!     upstream dates recorded on objects that may be unchanged
//!   - Computes the [`SyncPlan`] once
//!   - Executes every action in plan order and aggregates a [`RunSummary`]
//!
//! # Error Handling
//! Listing, parse and inventory failures are fatal and returned before any
//! object-store mutation. Failures while executing the plan are per-item:
//! they are recorded in the summary and the run continues.
//!
//! # Cancellation
//! A [`CancelFlag`] is checked between actions, never mid-fetch. Whatever has
//! completed stays valid; the next run recomputes the plan from current state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{key_for, normalise_prefix, SyncConfig};
use crate::contract::{HttpTransport, ObjectStore};
use crate::error::SyncError;
use crate::execute::{Executor, SyncResult, SyncStatus};
use crate::fetch::Fetcher;
use crate::inventory::{read_inventory, read_metadata};
use crate::listing::parse_listing;
use crate::plan::{plan, SyncAction, SyncPlan};

/// Shared interrupt flag, set from a signal handler and polled between actions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One failed action, with enough context to retry it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub action: &'static str,
    pub key: String,
    pub error: String,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    /// Actions left unexecuted because the run was cancelled.
    pub not_run: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// Clean run: nothing failed and nothing was left undone.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    pub fn record(&mut self, result: &SyncResult) {
        match (result.status, &result.action) {
            (SyncStatus::Succeeded, SyncAction::Upload { .. }) => self.uploaded += 1,
            (SyncStatus::Succeeded, SyncAction::Skip { .. }) => self.skipped += 1,
            (SyncStatus::Succeeded, SyncAction::Delete { .. }) => self.deleted += 1,
            (SyncStatus::Failed, action) => {
                self.failed += 1;
                self.failures.push(Failure {
                    action: action.kind(),
                    key: action.key().to_string(),
                    error: result
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                });
            }
        }
    }
}

/// Fetch the listing, read the inventory and compute the plan. Mutates nothing.
pub async fn prepare_plan<T, S>(
    config: &SyncConfig,
    fetcher: &mut Fetcher<T>,
    store: &S,
) -> Result<SyncPlan, SyncError>
where
    T: HttpTransport,
    S: ObjectStore + ?Sized,
{
    let prefix = normalise_prefix(&config.prefix);

    let html = fetcher
        .fetch_listing(&config.base_url)
        .await
        .map_err(|e| {
            error!(error = %e, url = %config.base_url, "[SYNC][ERROR] Failed to fetch listing");
            SyncError::Listing(e)
        })?;
    let listing = parse_listing(&html, &config.base_url).map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Failed to parse listing");
        e
    })?;
    info!(files = listing.entries.len(), links = listing.links_seen, "[SYNC] Upstream file count");

    let mut remote = read_inventory(store, &prefix).await.map_err(|e| {
        error!(error = %e, bucket = %config.bucket, "[SYNC][ERROR] Failed to read inventory");
        e
    })?;
    // Only dated entries can be compared against a recorded upstream date.
    let dated: HashSet<String> = listing
        .entries
        .iter()
        .filter(|e| e.last_modified.is_some())
        .map(|e| key_for(&prefix, &e.filename))
        .collect();
    read_metadata(store, &mut remote, |object| dated.contains(&object.key)).await;
    info!(objects = remote.len(), bucket = %config.bucket, prefix = %prefix, "[SYNC] Remote object count");

    if listing.is_empty() && !remote.is_empty() {
        if config.delete_missing {
            warn!(
                remote_objects = remote.len(),
                "[SYNC][WARN] Upstream listing has no files; every remote object will be deleted"
            );
        } else {
            warn!(
                remote_objects = remote.len(),
                "[SYNC][WARN] Upstream listing has no files but the store is not empty"
            );
        }
    }

    let plan = plan(&listing.entries, &remote, &prefix, config.delete_missing);
    info!(
        uploads = plan.uploads(),
        skips = plan.skips(),
        deletes = plan.deletes(),
        "[SYNC] Computed sync plan"
    );
    Ok(plan)
}

/// Run one full synchronisation.
pub async fn synchronise<T, S>(
    config: &SyncConfig,
    fetcher: &mut Fetcher<T>,
    store: &S,
    cancel: &CancelFlag,
) -> Result<RunSummary, SyncError>
where
    T: HttpTransport,
    S: ObjectStore + ?Sized,
{
    info!(bucket = %config.bucket, prefix = %config.prefix, "[SYNC] Starting synchronisation");
    let plan = prepare_plan(config, fetcher, store).await?;
    let summary = execute_plan(&plan, fetcher, store, cancel).await;
    info!(
        uploaded = summary.uploaded,
        skipped = summary.skipped,
        deleted = summary.deleted,
        failed = summary.failed,
        not_run = summary.not_run,
        cancelled = summary.cancelled,
        "[SYNC] Synchronisation finished"
    );
    Ok(summary)
}

/// Execute a computed plan in order, isolating per-item failures.
pub async fn execute_plan<T, S>(
    plan: &SyncPlan,
    fetcher: &mut Fetcher<T>,
    store: &S,
    cancel: &CancelFlag,
) -> RunSummary
where
    T: HttpTransport,
    S: ObjectStore + ?Sized,
{
    let mut summary = RunSummary::default();
    let mut executor = Executor::new(fetcher, store);

    for (done, action) in plan.actions.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            summary.not_run = plan.len() - done;
            warn!(remaining = summary.not_run, "[SYNC][WARN] Cancelled; stopping before next action");
            break;
        }
        let result = executor.execute(action).await;
        summary.record(&result);
    }
    summary
}
