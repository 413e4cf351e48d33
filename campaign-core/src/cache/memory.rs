//! In-memory content cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use super::{namespace_segments, CacheEntry, CacheError, CacheResult, CacheStore};

/// Volatile [`CacheStore`], mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    namespaces: RwLock<HashMap<String, BTreeMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheResult>, CacheError> {
        namespace_segments(namespace)?;
        let now = chrono::Utc::now().timestamp_millis();
        let namespaces = self.namespaces.read();
        Ok(namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .filter(|entry| !entry.metadata.is_expired(now))
            .map(|entry| CacheResult {
                key: key.to_string(),
                data: entry.data.clone(),
                metadata: entry.metadata.clone(),
                path: None,
            }))
    }

    fn set(&self, namespace: &str, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        namespace_segments(namespace)?;
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        namespace_segments(namespace)?;
        let mut namespaces = self.namespaces.write();
        Ok(namespaces
            .get_mut(namespace)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    fn remove_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        namespace_segments(namespace)?;
        let prefix = format!("{namespace}/");
        self.namespaces
            .write()
            .retain(|ns, _| ns != namespace && !ns.starts_with(&prefix));
        Ok(())
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        namespace_segments(namespace)?;
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn child_namespaces(&self, parent: &str) -> Result<Vec<String>, CacheError> {
        namespace_segments(parent)?;
        let prefix = format!("{parent}/");
        let children: BTreeSet<String> = self
            .namespaces
            .read()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .filter_map(|(ns, _)| ns.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(children.into_iter().collect())
    }
}
