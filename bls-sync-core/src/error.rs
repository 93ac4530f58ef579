//! Error taxonomy for a sync run.
//!
//! Fatal errors ([`SyncError`]) stop the run before any object-store mutation.
//! Per-item errors ([`FetchError`], [`StoreWriteError`], [`StoreDeleteError`])
//! are caught by the executor and recorded in the run summary.

use thiserror::Error;

/// The upstream listing did not contain any recognisable link structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("listing contains no anchor links (received {bytes} bytes); upstream may have returned an error page")]
    NoLinks { bytes: usize },
    #[error("invalid listing base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}

/// Failure talking to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Reading the remote inventory failed. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("access denied listing prefix {prefix:?}: {message}")]
    AccessDenied { prefix: String, message: String },
    #[error("object store unavailable listing prefix {prefix:?}: {message}")]
    Unavailable { prefix: String, message: String },
    #[error("pagination for prefix {prefix:?} returned a repeated continuation token")]
    Pagination { prefix: String },
}

impl InventoryError {
    pub(crate) fn from_store(prefix: &str, err: StoreError) -> Self {
        let prefix = prefix.to_string();
        match err {
            StoreError::AccessDenied(message) => InventoryError::AccessDenied { prefix, message },
            StoreError::NotFound(message)
            | StoreError::Unavailable(message)
            | StoreError::Other(message) => InventoryError::Unavailable { prefix, message },
        }
    }
}

/// Failure fetching a single upstream URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transient failure fetching {url} after {attempts} attempt(s): {message}")]
    Transient {
        url: String,
        attempts: u32,
        message: String,
    },
    #[error("access denied fetching {url} (HTTP {status}); upstream requires a descriptive User-Agent with contact details, set --user-agent")]
    AccessDenied { url: String, status: u16 },
    #[error("not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u16 },
    #[error("unexpected HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("request for {url} could not be sent: {message}")]
    Request { url: String, message: String },
}

/// Writing an object failed or could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreWriteError {
    #[error("put {key} failed: {source}")]
    Put { key: String, source: StoreError },
    #[error("put {key} could not be verified: {reason}")]
    Unverified { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delete {key} failed: {source}")]
pub struct StoreDeleteError {
    pub key: String,
    pub source: StoreError,
}

/// Per-item failure recorded by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Write(#[from] StoreWriteError),
    #[error(transparent)]
    Delete(#[from] StoreDeleteError),
}

/// Errors that abort a run before the plan is executed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch upstream listing: {0}")]
    Listing(#[source] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}
