//! Integration tests for the engine.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use chainstore::{BlockId, Config, Engine, Error, RangeDirection, SharedEngine};
use std::thread;
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Payloads in these tests are `"<key>:<body>"`.
fn key_of(_: BlockId, payload: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(payload).ok()?;
    text.split_once(':')?.0.parse().ok()
}

/// Test the index rebuilt from disk matches the one built live.
#[test]
fn test_rebuild_index_after_reopen() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.db");
    let config = Config::default();

    let live: Vec<(u32, BlockId)> = {
        let mut engine: Engine<u32> = Engine::open(&path, &config).unwrap();
        for key in [44u32, 3, 16, 1, 63, 81, 14, 55] {
            let body = "x".repeat(key as usize * 100);
            let id = engine.create_record(format!("{key}:{body}").as_bytes()).unwrap();
            engine.index_insert(key, id).unwrap();
        }

        let doomed = engine.index_get(&16).unwrap();
        engine.delete_record(doomed).unwrap();
        engine.index_delete(&16).unwrap();

        engine.flush().unwrap();
        engine.index_range(RangeDirection::GreaterThanOrEqual, &0)
    };

    let mut engine: Engine<u32> = Engine::open(&path, &config).unwrap();
    assert!(engine.index().is_empty());

    let indexed = engine.rebuild_index(key_of).unwrap();

    assert_eq!(indexed, 7);
    assert_eq!(engine.index_range(RangeDirection::GreaterThanOrEqual, &0), live);
    assert_eq!(engine.index_get(&16), None);
    engine.index().validate().unwrap();
}

/// Test the four directional scans over engine keys.
#[test]
fn test_index_range_directions() {
    let dir = tempdir().unwrap();
    let mut engine: Engine<u32> = Engine::open(dir.path().join("engine.db"), &Config::default()).unwrap();

    for key in [10u32, 20, 5, 6, 12, 30, 7, 17] {
        let id = engine.create_record(&key.to_le_bytes()).unwrap();
        engine.index_insert(key, id).unwrap();
    }

    let keys = |direction| -> Vec<u32> {
        engine
            .index_range(direction, &12)
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    };
    assert_eq!(keys(RangeDirection::LessThan), vec![5, 6, 7, 10]);
    assert_eq!(keys(RangeDirection::LessThanOrEqual), vec![5, 6, 7, 10, 12]);
    assert_eq!(keys(RangeDirection::GreaterThan), vec![17, 20, 30]);
    assert_eq!(keys(RangeDirection::GreaterThanOrEqual), vec![12, 17, 20, 30]);
}

/// Test update returns the id to keep using and the index stays valid.
#[test]
fn test_update_through_index() {
    let dir = tempdir().unwrap();
    let mut engine: Engine<String> = Engine::open(dir.path().join("engine.db"), &Config::default()).unwrap();

    let id = engine.create_record(b"draft").unwrap();
    engine.index_insert("doc".into(), id).unwrap();

    let new_id = engine.update_record(id, &[9u8; 9000]).unwrap();
    engine.index_insert("doc".into(), new_id).unwrap();

    let found = engine.index_get(&"doc".into()).unwrap();
    assert_eq!(engine.read_record(found).unwrap(), vec![9u8; 9000]);
}

/// Test a missing record and a missing key report not-found.
#[test]
fn test_not_found_paths() {
    let dir = tempdir().unwrap();
    let mut engine: Engine<u32> = Engine::open(dir.path().join("engine.db"), &Config::default()).unwrap();

    let err = engine.read_record(BlockId::new(3)).unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));
    assert!(err.is_recoverable());

    assert_eq!(engine.index_get(&1), None);
    assert!(!engine.index_delete(&1).unwrap());
}

/// Test concurrent writers through the shared engine.
#[test]
fn test_shared_engine_concurrent_writers() {
    init_tracing();
    let dir = tempdir().unwrap();
    let engine: Engine<u32> = Engine::open(dir.path().join("engine.db"), &Config::default()).unwrap();
    let shared = SharedEngine::new(engine);

    let handles: Vec<_> = (0..4u32)
        .map(|worker| {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..20u32 {
                    let key = worker * 1000 + i;
                    shared
                        .with(|engine| {
                            let id = engine.create_record(format!("{key}:payload").as_bytes())?;
                            engine.index_insert(key, id)
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    shared.with(|engine| {
        assert_eq!(engine.index().len(), 80);
        for (key, id) in engine.index_range(RangeDirection::GreaterThanOrEqual, &0) {
            let payload = engine.read_record(id).unwrap();
            assert_eq!(key_of(id, &payload), Some(key));
        }
    });
}
