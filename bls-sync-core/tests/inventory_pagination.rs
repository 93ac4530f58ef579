use bls_sync_core::contract::{MockObjectStore, ObjectMetadata, ObjectPage, RemoteObject};
use bls_sync_core::error::{InventoryError, StoreError};
use bls_sync_core::inventory::{read_inventory, read_metadata};
use bls_sync_core::memory::MemoryStore;

fn object(key: &str) -> RemoteObject {
    RemoteObject {
        key: key.to_string(),
        size: 1,
        etag: None,
        last_modified: None,
        metadata: ObjectMetadata::new(),
    }
}

#[tokio::test]
async fn test_inventory_follows_continuation_tokens() {
    let mut store = MockObjectStore::new();
    store
        .expect_list_page()
        .withf(|prefix: &str, token: &Option<String>| prefix == "bls/pr/" && token.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(ObjectPage {
                objects: vec![object("bls/pr/a.txt"), object("bls/pr/b.txt")],
                next: Some("t1".into()),
            })
        });
    store
        .expect_list_page()
        .withf(|prefix: &str, token: &Option<String>| {
            prefix == "bls/pr/" && token.as_deref() == Some("t1")
        })
        .times(1)
        .returning(|_, _| {
            Ok(ObjectPage {
                objects: vec![object("bls/pr/c.txt"), object("bls/pr/old/nested.txt")],
                next: None,
            })
        });

    let objects = read_inventory(&store, "bls/pr").await.expect("inventory reads");

    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["bls/pr/a.txt", "bls/pr/b.txt", "bls/pr/c.txt"]);
}

#[tokio::test]
async fn test_inventory_access_denied_is_fatal() {
    let mut store = MockObjectStore::new();
    store
        .expect_list_page()
        .returning(|_, _| Err(StoreError::AccessDenied("AccessDenied".into())));

    let err = read_inventory(&store, "bls/pr").await.expect_err("must fail");

    assert!(matches!(err, InventoryError::AccessDenied { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_inventory_rejects_repeated_token() {
    let mut store = MockObjectStore::new();
    store.expect_list_page().times(2).returning(|_, _| {
        Ok(ObjectPage {
            objects: vec![],
            next: Some("same".into()),
        })
    });

    let err = read_inventory(&store, "bls/pr").await.expect_err("must fail");

    assert!(matches!(err, InventoryError::Pagination { .. }));
}

#[tokio::test]
async fn test_inventory_ignores_sibling_prefixes() {
    let store = MemoryStore::new(2);
    for key in ["bls/pr/a.txt", "bls/pr/b.txt", "bls/pr/c.txt", "bls/pr2/x.txt", "other/y.txt"] {
        store.insert(object(key), vec![0]);
    }

    let objects = read_inventory(&store, "bls/pr").await.expect("inventory reads");

    assert_eq!(objects.len(), 3, "three pages of two, siblings excluded");
}

#[tokio::test]
async fn test_read_metadata_heads_only_selected_objects() {
    let mut store = MockObjectStore::new();
    store
        .expect_head()
        .withf(|key: &str| key == "bls/pr/a.txt")
        .times(1)
        .returning(|key| {
            let mut headed = object(key);
            headed.metadata.insert("upstream-url".into(), "https://x/a.txt".into());
            Ok(Some(headed))
        });
    let mut objects = vec![object("bls/pr/a.txt"), object("bls/pr/b.txt")];

    read_metadata(&store, &mut objects, |o| o.key.ends_with("a.txt")).await;

    assert_eq!(objects[0].metadata.len(), 1);
    assert!(objects[1].metadata.is_empty());
}

#[tokio::test]
async fn test_read_metadata_tolerates_head_failures() {
    let mut store = MockObjectStore::new();
    store
        .expect_head()
        .returning(|_| Err(StoreError::Unavailable("timeout".into())));
    let mut objects = vec![object("bls/pr/a.txt")];

    read_metadata(&store, &mut objects, |_| true).await;

    assert_eq!(objects, vec![object("bls/pr/a.txt")]);
}
