//! # S3 object store
//!
//! Implements [`bls_sync_core::contract::ObjectStore`] over `aws-sdk-s3`, so the
//! core pipeline can run against AWS S3 or any S3-compatible endpoint.
//!
//! - Credentials come from the default aws-config provider chain.
//! - `endpoint_url` switches to path-style addressing for MinIO and friends.
//! - SDK errors are mapped onto [`StoreError`] by error code; the core decides
//!   which of them are fatal.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use bls_sync_core::contract::{ObjectMetadata, ObjectPage, ObjectStore, RemoteObject};
use bls_sync_core::error::StoreError;

/// Where the mirror lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (e.g. `http://localhost:9000`).
    pub endpoint_url: Option<String>,
}

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn connect(options: &StoreOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &options.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            bucket = %options.bucket,
            region = ?sdk_config.region().map(|r| r.to_string()),
            endpoint_url = ?options.endpoint_url,
            "Initialised S3 store"
        );
        Self {
            client: Client::from_conf(builder.build()),
            bucket: options.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(store_error)?;

        let objects: Vec<RemoteObject> = response
            .contents()
            .iter()
            .filter_map(|object| {
                Some(RemoteObject {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    etag: object.e_tag().map(str::to_string),
                    last_modified: object.last_modified().and_then(to_chrono),
                    metadata: ObjectMetadata::new(),
                })
            })
            .collect();
        let next = match response.is_truncated() {
            Some(true) => response.next_continuation_token().map(str::to_string),
            _ => None,
        };
        debug!(prefix, objects = objects.len(), truncated = next.is_some(), "Listed S3 page");
        Ok(ObjectPage { objects, next })
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError> {
        let metadata: HashMap<String, String> = metadata.into_iter().collect();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(body.len() as i64)
            .set_metadata(Some(metadata))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => Ok(Some(RemoteObject {
                key: key.to_string(),
                size: response.content_length().unwrap_or_default().max(0) as u64,
                etag: response.e_tag().map(str::to_string),
                last_modified: response.last_modified().and_then(to_chrono),
                metadata: response
                    .metadata()
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default(),
            })),
            Err(SdkError::ServiceError(service)) if service.err().is_not_found() => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }
}

fn to_chrono(when: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(when.secs(), when.subsec_nanos())
}

/// Map an SDK failure onto the store error the core understands.
fn store_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Unavailable(message)
        }
        SdkError::ServiceError(service) => classify_code(service.err().code(), message),
        _ => StoreError::Other(message),
    }
}

fn classify_code(code: Option<&str>, message: String) -> StoreError {
    match code {
        Some(
            "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "AllAccessDisabled",
        ) => StoreError::AccessDenied(message),
        Some("NoSuchKey" | "NotFound" | "NoSuchBucket") => StoreError::NotFound(message),
        Some("SlowDown" | "ServiceUnavailable" | "InternalError" | "RequestTimeout") => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Other(message),
    }
}
