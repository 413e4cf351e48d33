//! Tests for the file-backed content cache
//!
//! Scenarios:
//! - Entries survive reopening the cache
//! - Overwrites replace data and metadata
//! - Freshness tokens round-trip

use tempfile::TempDir;

use campaign_core::{CacheEntry, CacheMetadata, CacheStore, ContentCache};

const NS: &str = "campaign/messages/m1";

fn metadata() -> CacheMetadata {
    CacheMetadata {
        etag: Some("\"v1\"".to_string()),
        last_modified: Some(784_111_777_000),
        expiry: None,
    }
}

#[test]
fn test_cache_new_creates_directory() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();

    assert!(temp.path().join("cache").is_dir());
    assert_eq!(cache.cache_dir(), temp.path().join("cache"));
}

#[test]
fn test_entry_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let cache = ContentCache::new(temp.path()).unwrap();
        cache
            .set(NS, "https://cdn.example.com/a.png", CacheEntry::new(b"png".to_vec(), metadata()))
            .unwrap();
    }

    let cache = ContentCache::new(temp.path()).unwrap();
    let hit = cache.get(NS, "https://cdn.example.com/a.png").unwrap().unwrap();
    assert_eq!(hit.key, "https://cdn.example.com/a.png");
    assert_eq!(hit.data, b"png");
    assert_eq!(hit.metadata, metadata());
}

#[test]
fn test_overwrite_replaces_data_and_metadata() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();

    cache.set(NS, "k", CacheEntry::new(b"old".to_vec(), metadata())).unwrap();
    cache
        .set(NS, "k", CacheEntry::new(b"new".to_vec(), CacheMetadata::default()))
        .unwrap();

    let hit = cache.get(NS, "k").unwrap().unwrap();
    assert_eq!(hit.data, b"new");
    assert_eq!(hit.metadata, CacheMetadata::default());
    assert_eq!(cache.keys(NS).unwrap(), vec!["k".to_string()]);
}

#[test]
fn test_miss_for_unknown_key() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();

    assert!(cache.get(NS, "missing").unwrap().is_none());
    assert!(!cache.remove(NS, "missing").unwrap());
}

#[test]
fn test_remove_entry() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();
    cache.set(NS, "k", CacheEntry::new(b"v".to_vec(), metadata())).unwrap();

    assert!(cache.remove(NS, "k").unwrap());
    assert!(cache.get(NS, "k").unwrap().is_none());
    assert!(cache.keys(NS).unwrap().is_empty());
}

#[test]
fn test_keys_with_path_characters() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();
    let key = "https://cdn.example.com/img/../a b.png?x=1";
    cache.set(NS, key, CacheEntry::new(b"v".to_vec(), metadata())).unwrap();

    assert_eq!(cache.keys(NS).unwrap(), vec![key.to_string()]);
    assert_eq!(cache.get(NS, key).unwrap().unwrap().data, b"v");
}

#[test]
fn test_invalid_namespace_rejected() {
    let temp = TempDir::new().unwrap();
    let cache = ContentCache::new(temp.path()).unwrap();

    assert!(cache
        .set("../escape", "k", CacheEntry::new(b"v".to_vec(), metadata()))
        .is_err());
    assert!(cache.get("", "k").is_err());
}
