//! Sync executor: applies one [`SyncAction`] at a time.
//!
//! A failing item never aborts the run. Each call returns a [`SyncResult`]
//! and emits one structured audit event.

use tracing::{error, info, warn};

pub use crate::contract::{META_UPSTREAM_LAST_MODIFIED, META_UPSTREAM_URL};

use crate::contract::{HttpTransport, ObjectMetadata, ObjectStore, UpstreamEntry};
use crate::error::{FetchError, ItemError, StoreDeleteError, StoreError, StoreWriteError};
use crate::fetch::Fetcher;
use crate::plan::SyncAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Succeeded,
    Failed,
}

/// Outcome of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub action: SyncAction,
    pub status: SyncStatus,
    /// HTTP attempts spent on the upstream fetch (0 for skips and deletes).
    pub attempts: u32,
    pub error: Option<ItemError>,
}

impl SyncResult {
    fn succeeded(action: &SyncAction, attempts: u32) -> Self {
        Self {
            action: action.clone(),
            status: SyncStatus::Succeeded,
            attempts,
            error: None,
        }
    }

    fn failed(action: &SyncAction, attempts: u32, error: ItemError) -> Self {
        Self {
            action: action.clone(),
            status: SyncStatus::Failed,
            attempts,
            error: Some(error),
        }
    }
}

/// Runs actions against a fetcher and a store borrowed for one run.
pub struct Executor<'a, T, S: ?Sized> {
    fetcher: &'a mut Fetcher<T>,
    store: &'a S,
}

impl<'a, T, S> Executor<'a, T, S>
where
    T: HttpTransport,
    S: ObjectStore + ?Sized,
{
    pub fn new(fetcher: &'a mut Fetcher<T>, store: &'a S) -> Self {
        Self { fetcher, store }
    }

    pub async fn execute(&mut self, action: &SyncAction) -> SyncResult {
        let result = match action {
            SyncAction::Upload { entry, key, .. } => match self.upload(entry, key).await {
                Ok(attempts) => SyncResult::succeeded(action, attempts),
                Err((attempts, e)) => SyncResult::failed(action, attempts, e),
            },
            SyncAction::Skip { .. } => SyncResult::succeeded(action, 0),
            SyncAction::Delete { key } => match self.delete(key).await {
                Ok(()) => SyncResult::succeeded(action, 0),
                Err(e) => SyncResult::failed(action, 0, e.into()),
            },
        };
        audit(&result);
        result
    }

    /// Fetch, put, then confirm the stored size matches what was fetched.
    async fn upload(&mut self, entry: &UpstreamEntry, key: &str) -> Result<u32, (u32, ItemError)> {
        let fetched = match self.fetcher.fetch(entry).await {
            Ok(f) => f,
            Err(e) => return Err((attempts_spent(&e), e.into())),
        };
        let attempts = fetched.attempts;
        let expected = fetched.body.len() as u64;

        let mut metadata = ObjectMetadata::new();
        metadata.insert(META_UPSTREAM_URL.to_string(), entry.url.clone());
        if let Some(when) = entry.last_modified {
            metadata.insert(META_UPSTREAM_LAST_MODIFIED.to_string(), when.to_rfc3339());
        }

        self.store
            .put(key, fetched.body, metadata)
            .await
            .map_err(|source| {
                (
                    attempts,
                    StoreWriteError::Put {
                        key: key.to_string(),
                        source,
                    }
                    .into(),
                )
            })?;

        let unverified = |reason: String| {
            (
                attempts,
                ItemError::from(StoreWriteError::Unverified {
                    key: key.to_string(),
                    reason,
                }),
            )
        };
        match self.store.head(key).await {
            Ok(Some(stored)) if stored.size == expected => Ok(attempts),
            Ok(Some(stored)) => Err(unverified(format!(
                "stored size {} does not match fetched size {expected}",
                stored.size
            ))),
            Ok(None) => Err(unverified("object missing after put".to_string())),
            Err(e) => Err(unverified(format!("head failed: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreDeleteError> {
        match self.store.delete(key).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                info!(key = %key, "[EXECUTE] Object already absent, treating delete as done");
                Ok(())
            }
            Err(source) => Err(StoreDeleteError {
                key: key.to_string(),
                source,
            }),
        }
    }
}

fn attempts_spent(err: &FetchError) -> u32 {
    match err {
        FetchError::Transient { attempts, .. } => *attempts,
        _ => 1,
    }
}

fn audit(result: &SyncResult) {
    let key = result.action.key();
    let action = result.action.kind();
    match (&result.status, &result.error) {
        (SyncStatus::Succeeded, _) if result.attempts > 1 => {
            warn!(action, key = %key, attempts = result.attempts, retries = result.attempts - 1, status = "succeeded", "[EXECUTE] Action succeeded after retries");
        }
        (SyncStatus::Succeeded, _) => {
            info!(action, key = %key, attempts = result.attempts, status = "succeeded", "[EXECUTE] Action succeeded");
        }
        (SyncStatus::Failed, cause) => {
            let cause = cause.as_ref().map(ToString::to_string).unwrap_or_default();
            error!(action, key = %key, attempts = result.attempts, status = "failed", error = %cause, "[EXECUTE] Action failed");
        }
    }
}
