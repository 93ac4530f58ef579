//! # contract: capability interfaces and shared data types
//!
//! This module defines the two seams the sync engine consumes and never
//! implements itself in production:
//!
//! - [`ObjectStore`]: list / put / delete / head on a key-value object store.
//!   Any S3-compatible store, or anything else offering these four operations,
//!   satisfies it. The CLI crate provides the S3 implementation.
//! - [`HttpTransport`]: a single HTTP GET. The production implementation is
//!   [`crate::fetch::ReqwestTransport`]; throttling and retries live above it
//!   in [`crate::fetch::Fetcher`].
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can script store and
//!   network behaviour deterministically.
//! - [`crate::memory::MemoryStore`] is a stateful in-memory store for scenario
//!   tests that need to observe the store after a run.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Serialize;

use crate::error::StoreError;

/// One file discovered in the upstream directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamEntry {
    pub filename: String,
    /// Absolute URL the file is fetched from.
    pub url: String,
    /// Exact size in bytes, when the listing states one.
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object-store state for one key at inventory time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    /// When the store received the object, not when upstream published it.
    pub last_modified: Option<DateTime<Utc>>,
    /// User metadata. Paginated listings leave it empty; `head` fills it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ObjectMetadata,
}

impl RemoteObject {
    /// Upstream timestamp recorded at upload time, if the object carries one.
    pub fn recorded_upstream_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata.get(META_UPSTREAM_LAST_MODIFIED)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|when| when.with_timezone(&Utc))
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Continuation token for the next page; `None` once exhausted.
    pub next: Option<String>,
}

/// User metadata attached to uploaded objects.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Metadata key holding the URL an object was fetched from.
pub const META_UPSTREAM_URL: &str = "upstream-url";
/// Metadata key holding the listing timestamp (RFC 3339) at upload time.
pub const META_UPSTREAM_LAST_MODIFIED: &str = "upstream-last-modified";

/// Object-store capability consumed by the inventory reader and executor.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of objects whose keys start with `prefix`.
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StoreError>;

    /// Write the full object body under `key`.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Remove `key`. A key that is already absent is reported as
    /// [`StoreError::NotFound`] when the store can tell, so callers can treat
    /// repeated deletes as done.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Size, timestamps and user metadata for `key`, or `None` when it does
    /// not exist.
    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, StoreError>;
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    /// The connection broke while reading the body.
    Body,
    Other,
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

/// Single-request HTTP capability. Headers, timeouts and TLS are the
/// implementor's concern; status handling is the caller's.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}
