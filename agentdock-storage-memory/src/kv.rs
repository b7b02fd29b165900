//! The KV/list half of [`crate::MemoryProvider`] — spec §4.1.
//!
//! Grounded on `neuron-state-memory::MemoryStore`: a `HashMap` behind a
//! `tokio::sync::RwLock`, with scope (there: `Scope`, here: `namespace`)
//! folded into a composite key via a NUL separator so that keys with a
//! `\0` byte in them can never alias across namespaces.

use agentdock_core::StorageError;
use agentdock_storage::StorageOptions;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A stored value plus its optional absolute expiry. Expiry is lazy:
/// reads filter expired rows and purge them opportunistically (spec §4.1
/// "Expiry is lazy").
#[derive(Debug, Clone)]
pub(crate) struct StoredValue {
    pub(crate) value: serde_json::Value,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Build a composite key from namespace + key to ensure isolation.
pub(crate) fn composite_key(namespace: Option<&str>, key: &str) -> String {
    format!("{}\0{key}", namespace.unwrap_or(""))
}

/// Extract the user-facing key from a composite key, if it belongs to the
/// given namespace prefix.
fn extract_key<'a>(composite: &'a str, namespace_prefix: &str) -> Option<&'a str> {
    composite
        .strip_prefix(namespace_prefix)
        .and_then(|rest| rest.strip_prefix('\0'))
}

/// In-process KV + list store backing [`crate::MemoryProvider`].
pub(crate) struct KvStore {
    pub(crate) kv: tokio::sync::RwLock<HashMap<String, StoredValue>>,
    pub(crate) lists: tokio::sync::RwLock<HashMap<String, StoredValue>>,
}

impl KvStore {
    pub(crate) fn new() -> Self {
        Self {
            kv: tokio::sync::RwLock::new(HashMap::new()),
            lists: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    fn expiry(opts: &StorageOptions, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        opts.ttl_seconds.map(|secs| now + chrono::Duration::seconds(secs))
    }

    pub(crate) async fn get(
        &self,
        key: &str,
        opts: &StorageOptions,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let now = Utc::now();
        let mut data = self.kv.write().await;
        match data.get(&ck) {
            Some(stored) if stored.is_expired(now) => {
                data.remove(&ck);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        opts: &StorageOptions,
    ) -> Result<(), StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let now = Utc::now();
        let mut data = self.kv.write().await;
        data.insert(
            ck,
            StoredValue {
                value,
                expires_at: Self::expiry(opts, now),
            },
        );
        Ok(())
    }

    pub(crate) async fn delete(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let mut data = self.kv.write().await;
        Ok(data.remove(&ck).is_some())
    }

    pub(crate) async fn list(&self, prefix: &str, opts: &StorageOptions) -> Result<Vec<String>, StorageError> {
        let ns_prefix = format!("{}\0", opts.namespace.as_deref().unwrap_or(""));
        let now = Utc::now();
        let mut data = self.kv.write().await;
        let expired: Vec<String> = data
            .iter()
            .filter(|(_, v)| v.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            data.remove(&k);
        }
        let keys: Vec<String> = data
            .keys()
            .filter_map(|ck| {
                extract_key(ck, ns_prefix.trim_end_matches('\0')).and_then(|k| {
                    if k.starts_with(prefix) {
                        Some(k.to_string())
                    } else {
                        None
                    }
                })
            })
            .collect();
        Ok(keys)
    }

    pub(crate) async fn get_list(
        &self,
        key: &str,
        start: usize,
        end: usize,
        opts: &StorageOptions,
    ) -> Result<Option<Vec<serde_json::Value>>, StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let now = Utc::now();
        let mut data = self.lists.write().await;
        match data.get(&ck) {
            Some(stored) if stored.is_expired(now) => {
                data.remove(&ck);
                Ok(None)
            }
            Some(stored) => {
                let arr = stored.value.as_array().cloned().unwrap_or_default();
                let end = end.min(arr.len());
                let start = start.min(end);
                Ok(Some(arr[start..end].to_vec()))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn save_list(
        &self,
        key: &str,
        values: Vec<serde_json::Value>,
        opts: &StorageOptions,
    ) -> Result<(), StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let now = Utc::now();
        let mut data = self.lists.write().await;
        data.insert(
            ck,
            StoredValue {
                value: serde_json::Value::Array(values),
                expires_at: Self::expiry(opts, now),
            },
        );
        Ok(())
    }

    pub(crate) async fn delete_list(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError> {
        let ck = composite_key(opts.namespace.as_deref(), key);
        let mut data = self.lists.write().await;
        Ok(data.remove(&ck).is_some())
    }

    /// Remove every row whose namespace starts with `prefix` (the whole
    /// store if `None`). There is no per-call `StorageOptions` here, so
    /// `prefix` is matched against the namespace portion of the composite
    /// key rather than the user-facing key.
    pub(crate) async fn clear(&self, prefix: Option<&str>) -> Result<(), StorageError> {
        let mut kv = self.kv.write().await;
        let mut lists = self.lists.write().await;
        match prefix {
            Some(p) => {
                let matches_namespace = |k: &String| {
                    k.split_once('\0')
                        .map(|(ns, _)| ns.starts_with(p))
                        .unwrap_or(false)
                };
                kv.retain(|k, _| !matches_namespace(k));
                lists.retain(|k, _| !matches_namespace(k));
            }
            None => {
                kv.clear();
                lists.clear();
            }
        }
        Ok(())
    }
}
