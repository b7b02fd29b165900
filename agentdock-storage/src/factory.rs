//! Process-wide storage backend registry (spec §4.1 "Factory").
//!
//! Grounded on `neuron-orch-local`'s `HashMap<String, Arc<dyn Operator>>`
//! dispatch table: constructors are registered by a type tag, and
//! `(type, namespace)` resolves to a cached, shared instance for the life
//! of the process. DESIGN NOTES calls for this registry to be an explicit
//! constructor argument of the top-level core object rather than a
//! language-level global — `agentdock` (the facade crate) owns the single
//! instance; this type doesn't enforce a singleton itself.

use crate::provider::StorageProvider;
use agentdock_core::StorageError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A constructor for a storage backend, given the namespace it should
/// serve.
pub type BackendConstructor =
    Arc<dyn Fn(&str) -> Result<Arc<dyn StorageProvider>, StorageError> + Send + Sync>;

/// Registry mapping a backend type tag (`"memory"`, `"sqlite"`, ...) to a
/// constructor, with instances cached by `(type, namespace)`.
pub struct StorageFactory {
    constructors: HashMap<String, BackendConstructor>,
    cache: RwLock<HashMap<(String, String), Arc<dyn StorageProvider>>>,
}

impl StorageFactory {
    /// An empty factory with no registered backend types.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register a constructor for `type_tag`. Overwrites any existing
    /// registration for the same tag.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        ctor: impl Fn(&str) -> Result<Arc<dyn StorageProvider>, StorageError> + Send + Sync + 'static,
    ) {
        self.constructors.insert(type_tag.into(), Arc::new(ctor));
    }

    /// Resolve `(type_tag, namespace)` to a provider instance, constructing
    /// and caching it on first use. Subsequent calls with the same key
    /// return the same `Arc` for the life of the process.
    pub async fn get_or_create(
        &self,
        type_tag: &str,
        namespace: &str,
    ) -> Result<Arc<dyn StorageProvider>, StorageError> {
        let key = (type_tag.to_string(), namespace.to_string());
        {
            let cache = self.cache.read().await;
            if let Some(provider) = cache.get(&key) {
                return Ok(Arc::clone(provider));
            }
        }
        let ctor = self
            .constructors
            .get(type_tag)
            .ok_or_else(|| StorageError::Backend(format!("no backend registered for {type_tag}")))?;
        let provider = ctor(namespace)?;
        let mut cache = self.cache.write().await;
        // Another task may have raced us to construct the same key; keep
        // whichever entry is already there rather than replace it, so
        // callers never see two live instances for one (type, namespace).
        let provider = Arc::clone(cache.entry(key).or_insert(provider));
        Ok(provider)
    }

    /// Invoke `destroy` on every cached instance and drop them. Intended
    /// to run once at process shutdown.
    pub async fn shutdown(&self) {
        let mut cache = self.cache.write().await;
        for provider in cache.values() {
            provider.destroy().await;
        }
        cache.clear();
    }
}

impl Default for StorageFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_ops::MemoryOps;
    use crate::options::StorageOptions;
    use crate::vector_ops::VectorOps;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        id: usize,
    }

    #[async_trait]
    impl StorageProvider for StubProvider {
        async fn get(&self, _key: &str, _opts: &StorageOptions) -> Result<Option<serde_json::Value>, StorageError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: serde_json::Value, _opts: &StorageOptions) -> Result<(), StorageError> {
            Ok(())
        }
        async fn delete(&self, _key: &str, _opts: &StorageOptions) -> Result<bool, StorageError> {
            Ok(false)
        }
        async fn list(&self, _prefix: &str, _opts: &StorageOptions) -> Result<Vec<String>, StorageError> {
            Ok(vec![])
        }
        async fn get_list(
            &self,
            _key: &str,
            _start: usize,
            _end: usize,
            _opts: &StorageOptions,
        ) -> Result<Option<Vec<serde_json::Value>>, StorageError> {
            Ok(None)
        }
        async fn save_list(&self, _key: &str, _values: Vec<serde_json::Value>, _opts: &StorageOptions) -> Result<(), StorageError> {
            Ok(())
        }
        async fn delete_list(&self, _key: &str, _opts: &StorageOptions) -> Result<bool, StorageError> {
            Ok(false)
        }
        async fn clear(&self, _prefix: Option<&str>) -> Result<(), StorageError> {
            Ok(())
        }
        fn as_memory_ops(&self) -> Option<&dyn MemoryOps> {
            None
        }
        fn as_vector_ops(&self) -> Option<&dyn VectorOps> {
            None
        }
    }

    #[tokio::test]
    async fn same_key_returns_same_instance() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut factory = StorageFactory::new();
        let counter_clone = Arc::clone(&counter);
        factory.register("memory", move |_ns| {
            let id = counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubProvider { id }) as Arc<dyn StorageProvider>)
        });

        let a = factory.get_or_create("memory", "sessions").await.unwrap();
        let b = factory.get_or_create("memory", "sessions").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_namespaces_get_different_instances() {
        let mut factory = StorageFactory::new();
        factory.register("memory", |_ns| Ok(Arc::new(StubProvider { id: 0 }) as Arc<dyn StorageProvider>));

        let a = factory.get_or_create("memory", "sessions").await.unwrap();
        let b = factory.get_or_create("memory", "memories").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn unknown_backend_type_errors() {
        let factory = StorageFactory::new();
        let result = factory.get_or_create("postgres", "sessions").await;
        assert!(result.is_err());
    }
}
