// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! File-backed content cache
//!
//! Each namespace is a directory below `<storage>/cache`. An entry is stored
//! as two files named after the SHA-256 of its key: the payload and a
//! `.meta` JSON record holding the logical key and freshness token.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use super::{
    cache_key, namespace_segments, CacheEntry, CacheError, CacheMetadata, CacheResult, CacheStore,
};

const META_EXTENSION: &str = "meta";

#[derive(Debug, Serialize, Deserialize)]
struct MetaRecord {
    key: String,
    #[serde(flatten)]
    metadata: CacheMetadata,
}

/// Local on-disk cache for downloaded content
pub struct ContentCache {
    cache_dir: PathBuf,
    lock: RwLock<()>,
}

impl ContentCache {
    /// Create a new content cache at the given storage path
    ///
    /// Creates a `cache/` subdirectory if it doesn't exist.
    pub fn new(storage_path: &Path) -> Result<Self, CacheError> {
        let cache_dir = storage_path.join("cache");
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            lock: RwLock::new(()),
        })
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, CacheError> {
        let mut dir = self.cache_dir.clone();
        for segment in namespace_segments(namespace)? {
            dir.push(segment);
        }
        Ok(dir)
    }

    fn entry_paths(&self, namespace: &str, key: &str) -> Result<(PathBuf, PathBuf), CacheError> {
        let dir = self.namespace_dir(namespace)?;
        let name = cache_key(key);
        let meta = dir.join(format!("{name}.{META_EXTENSION}"));
        Ok((dir.join(name), meta))
    }
}

impl CacheStore for ContentCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheResult>, CacheError> {
        let (data_path, meta_path) = self.entry_paths(namespace, key)?;
        let _guard = self.lock.read();

        let Some(meta_bytes) = read_optional(&meta_path)? else {
            return Ok(None);
        };
        let record: MetaRecord = serde_json::from_slice(&meta_bytes)?;
        if record.key != key || record.metadata.is_expired(chrono::Utc::now().timestamp_millis()) {
            return Ok(None);
        }
        let Some(data) = read_optional(&data_path)? else {
            return Ok(None);
        };

        Ok(Some(CacheResult {
            key: record.key,
            data,
            metadata: record.metadata,
            path: Some(data_path),
        }))
    }

    fn set(&self, namespace: &str, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let (data_path, meta_path) = self.entry_paths(namespace, key)?;
        let record = MetaRecord {
            key: key.to_string(),
            metadata: entry.metadata,
        };
        let meta = serde_json::to_vec(&record)?;

        let _guard = self.lock.write();
        if let Some(dir) = data_path.parent() {
            fs::create_dir_all(dir)?;
        }
        atomic_write(&data_path, &entry.data)?;
        atomic_write(&meta_path, &meta)?;
        trace!("Cached {} bytes for {key} in {namespace}", entry.data.len());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let (data_path, meta_path) = self.entry_paths(namespace, key)?;
        let _guard = self.lock.write();
        let had_meta = remove_optional(&meta_path)?;
        let had_data = remove_optional(&data_path)?;
        Ok(had_meta || had_data)
    }

    fn remove_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.write();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                trace!("Cleared cache namespace {namespace}");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.lock.read();

        let mut keys = Vec::new();
        for entry in read_dir_optional(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(META_EXTENSION)
            {
                continue;
            }
            let record: MetaRecord = serde_json::from_slice(&fs::read(&path)?)?;
            keys.push(record.key);
        }
        keys.sort();
        Ok(keys)
    }

    fn child_namespaces(&self, parent: &str) -> Result<Vec<String>, CacheError> {
        let dir = self.namespace_dir(parent)?;
        let _guard = self.lock.read();

        let mut children = Vec::new();
        for entry in read_dir_optional(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    children.push(name.to_string());
                }
            }
        }
        children.sort();
        Ok(children)
    }
}

/// Atomic file write (write to temp, then rename)
///
/// The file is never in a partial state: either the old content remains or
/// the new content is fully written. Temp names are unique so concurrent
/// caches over the same directory do not clobber each other.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    fs::write(&temp_path, data)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn read_dir_optional(dir: &Path) -> Result<Vec<io::Result<fs::DirEntry>>, CacheError> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries.collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
