//! Remote inventory reader: everything currently stored under the sync prefix.
//!
//! The result is advisory. The store may be mutated concurrently, so the
//! inventory is a best-effort view at plan time, not a snapshot.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::filename_for;
use crate::contract::{ObjectStore, RemoteObject};
use crate::error::InventoryError;

/// List every object that maps to an upstream filename under `prefix`,
/// following continuation tokens until the store reports no more pages.
///
/// Keys nested deeper than one level below the prefix can never be produced
/// by the key mapping and are left out.
pub async fn read_inventory<S>(store: &S, prefix: &str) -> Result<Vec<RemoteObject>, InventoryError>
where
    S: ObjectStore + ?Sized,
{
    let list_prefix = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    };

    let mut objects = Vec::new();
    let mut seen_tokens = HashSet::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;
    let mut nested = 0usize;

    loop {
        let page = store
            .list_page(&list_prefix, continuation.clone())
            .await
            .map_err(|e| InventoryError::from_store(&list_prefix, e))?;
        pages += 1;

        for object in page.objects {
            if filename_for(prefix, &object.key).is_some() {
                objects.push(object);
            } else {
                nested += 1;
            }
        }

        match page.next {
            Some(token) => {
                if !seen_tokens.insert(token.clone()) {
                    return Err(InventoryError::Pagination {
                        prefix: list_prefix,
                    });
                }
                debug!(page = pages, "[INVENTORY] Fetching next page");
                continuation = Some(token);
            }
            None => break,
        }
    }

    info!(
        prefix = %list_prefix,
        pages,
        objects = objects.len(),
        ignored_nested = nested,
        "[INVENTORY] Read remote inventory"
    );
    Ok(objects)
}

/// Fill in user metadata for the objects `wanted` selects, one `head` each,
/// since paginated listings do not carry it. A failed `head` leaves the
/// object as listed and planning falls back to the store's own timestamp.
pub async fn read_metadata<S, F>(store: &S, objects: &mut [RemoteObject], wanted: F)
where
    S: ObjectStore + ?Sized,
    F: Fn(&RemoteObject) -> bool,
{
    let mut read = 0usize;
    let mut failed = 0usize;

    for object in objects.iter_mut() {
        if !object.metadata.is_empty() || !wanted(object) {
            continue;
        }
        match store.head(&object.key).await {
            Ok(Some(headed)) => {
                object.metadata = headed.metadata;
                read += 1;
            }
            Ok(None) => debug!(key = %object.key, "[INVENTORY] Object gone before head"),
            Err(e) => {
                failed += 1;
                warn!(key = %object.key, error = %e, "[INVENTORY] Could not read object metadata");
            }
        }
    }

    info!(read, failed, "[INVENTORY] Read recorded metadata");
}
