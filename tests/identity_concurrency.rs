//! Concurrent first-run initializers must end up sharing one identity.

use std::sync::Arc;

use tempfile::TempDir;
use vchat_core::identity;
use vchat_core::storage::{MemoryStore, RecordStore, SqliteStore};
use vchat_core::{CoreConfig, Error, VChatCore};

const TEST_BITS: usize = 1024;

fn test_config(path: Option<String>) -> CoreConfig {
    CoreConfig {
        storage_path: path,
        rsa_key_bits: TEST_BITS,
        ..CoreConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ensure_on_memory_store() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            identity::ensure_identity_async(store, TEST_BITS).await
        }));
    }

    let mut identifiers = Vec::new();
    for handle in handles {
        identifiers.push(handle.await.unwrap().unwrap().identifier());
    }
    identifiers.dedup();
    assert_eq!(identifiers.len(), 1);
    assert_eq!(store.identity_count().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_initialize_has_one_winner() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            identity::initialize_identity_async(store, TEST_BITS).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::AlreadyInitialized) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.identity_count().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cores_sharing_a_database_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vchat.db").to_string_lossy().into_owned();

    // Create the schema once so the cores below only race on the identity.
    drop(SqliteStore::open(Some(&path)).unwrap());

    let mut handles = Vec::new();
    for _ in 0..3 {
        let config = test_config(Some(path.clone()));
        handles.push(tokio::spawn(async move {
            let core = VChatCore::open(config)?;
            core.ensure_identity().await
        }));
    }

    let mut records = Vec::new();
    for handle in handles {
        records.push(handle.await.unwrap().unwrap());
    }
    assert!(records.windows(2).all(|w| w[0] == w[1]));

    let reopened = VChatCore::open(test_config(Some(path))).unwrap();
    assert_eq!(reopened.identity().unwrap(), records[0]);
}

#[tokio::test]
async fn identity_survives_reopen_and_rotation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vchat.db").to_string_lossy().into_owned();

    let original = {
        let core = VChatCore::open(test_config(Some(path.clone()))).unwrap();
        core.initialize_identity().await.unwrap()
    };

    let core = VChatCore::open(test_config(Some(path.clone()))).unwrap();
    assert_eq!(core.identity().unwrap(), original);
    assert!(matches!(
        core.initialize_identity().await,
        Err(Error::AlreadyInitialized)
    ));

    let rotated = core.rotate_identity_keys().await.unwrap();
    assert_eq!(rotated.identifier(), original.identifier());
    drop(core);

    let core = VChatCore::open(test_config(Some(path))).unwrap();
    assert_eq!(core.identity().unwrap(), rotated);
}

#[tokio::test(flavor = "current_thread")]
async fn first_run_does_not_stall_the_runtime() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vchat.db").to_string_lossy().into_owned();
    let core = VChatCore::open(test_config(Some(path))).unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                ticks.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        })
    };

    let created = core.ensure_identity().await.unwrap();
    assert!(ticks.load(Ordering::Relaxed) > 0);

    assert_eq!(core.ensure_identity().await.unwrap(), created);
    ticker.abort();
}
