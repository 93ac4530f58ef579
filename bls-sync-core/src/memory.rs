//! In-memory [`ObjectStore`] for tests and dry experiments.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::contract::{ObjectMetadata, ObjectPage, ObjectStore, RemoteObject};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
    pub object: RemoteObject,
}

/// Thread-safe map of key to object, paginated like a real store.
#[derive(Debug)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Seed an object directly, bypassing `put`.
    pub fn insert(&self, object: RemoteObject, body: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(
            object.key.clone(),
            StoredObject {
                body,
                metadata: object.metadata.clone(),
                object,
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StoreError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let mut matching = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| continuation.as_deref().map_or(true, |after| k.as_str() > after));
        let page: Vec<RemoteObject> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(_, v)| RemoteObject {
                // Listings carry no user metadata, like S3's.
                metadata: ObjectMetadata::new(),
                ..v.object.clone()
            })
            .collect();
        let next = match (matching.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };
        Ok(ObjectPage {
            objects: page,
            next,
        })
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let object = RemoteObject {
            key: key.to_string(),
            size: body.len() as u64,
            etag: Some(format!("\"{:x}\"", body.len())),
            last_modified: Some(Utc::now()),
            metadata: metadata.clone(),
        };
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                metadata,
                object,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        match objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects.get(key).map(|o| o.object.clone()))
    }
}
