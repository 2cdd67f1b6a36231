mod common;

use cira_runtime::loader::{BlockLoader, BlockProvider, LoadError, PLATFORM_EXT};
use cira_runtime::registry::BlockRegistry;
use common::Probe;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_availability_follows_filesystem() {
    let dir = tempdir().expect("tempdir");
    let loader = BlockLoader::new(dir.path());

    assert!(!loader.is_block_available("bme280-sensor", "1.0.0"));

    let path = dir.path().join(format!("bme280-sensor-v1.0.0.{PLATFORM_EXT}"));
    fs::write(&path, b"not a real library").expect("write stub");
    assert!(loader.is_block_available("bme280-sensor", "1.0.0"));

    // A directory with the right name is not a block library.
    let dir_path = dir.path().join(format!("fake-block-v1.0.0.{PLATFORM_EXT}"));
    fs::create_dir(&dir_path).expect("create dir");
    assert!(!loader.is_block_available("fake-block", "1.0.0"));
}

#[test]
fn test_load_missing_library_reports_open_stage() {
    let dir = tempdir().expect("tempdir");
    let loader = BlockLoader::new(dir.path());

    let err = loader
        .load("absent-sensor", "1.0.0")
        .expect_err("load must fail");
    assert!(matches!(err, LoadError::LibraryOpen { .. }));
    assert_eq!(loader.loaded_count(), 0);
}

#[test]
fn test_load_invalid_library_fails() {
    let dir = tempdir().expect("tempdir");
    let path = dir
        .path()
        .join(format!("garbage-block-v1.0.0.{PLATFORM_EXT}"));
    fs::write(&path, b"\x7fELF not really").expect("write stub");

    let loader = BlockLoader::new(dir.path());
    let err = loader
        .load("garbage-block", "1.0.0")
        .expect_err("load must fail");
    assert!(matches!(err, LoadError::LibraryOpen { .. }));
}

#[test]
fn test_registry_hands_out_one_shared_instance() {
    let probe = Arc::new(Probe::default());
    let created = Arc::new(AtomicU64::new(0));
    let mut registry = BlockRegistry::new();
    {
        let probe = probe.clone();
        let created = created.clone();
        registry.register("producer", "1.0.0", move || {
            created.fetch_add(1, Ordering::SeqCst);
            Box::new(common::Producer::float("producer", 1.0, probe.clone()))
        });
    }

    let first = registry.acquire("producer", "1.0.0").expect("acquire");
    let second = registry.acquire("producer", "1.0.0").expect("acquire");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registry_availability() {
    let probe = Arc::new(Probe::default());
    let mut registry = BlockRegistry::new();
    common::register_producer(&mut registry, "producer", 1.0, &probe);

    assert!(registry.is_available("producer", "1.0.0"));
    assert!(!registry.is_available("producer", "2.0.0"));
    assert!(!registry.is_available("other", "1.0.0"));

    let err = registry
        .acquire("other", "1.0.0")
        .expect_err("unknown block");
    assert!(matches!(err, LoadError::Unregistered { .. }));
    assert_eq!(err.to_string(), "no block registered for other-1.0.0");
}

#[test]
fn test_unload_clears_cache() {
    let dir = tempdir().expect("tempdir");
    let loader = BlockLoader::new(dir.path());

    // Nothing loaded; both unload flavors are harmless no-ops.
    loader.unload("absent-sensor", "1.0.0");
    loader.unload_all();
    assert_eq!(loader.loaded_count(), 0);
}
