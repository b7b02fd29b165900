//! The `StorageProvider` contract (spec §4.1).
//!
//! Mirrors `layer0::state::StateStore`'s shape (CRUD + list, async-trait,
//! `Send + Sync`) but widened to the unified KV/list/memory/vector contract
//! spec §4.1 describes, and to the capability-probe pattern DESIGN NOTES
//! calls for instead of nullable method tables: `as_memory_ops` /
//! `as_vector_ops` return `None` by default and are overridden by providers
//! whose backend actually supports them.

use crate::memory_ops::MemoryOps;
use crate::options::StorageOptions;
use crate::vector_ops::VectorOps;
use agentdock_core::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Unified storage contract: KV get/set/delete/list, list ops, optional
/// memory and vector capability bundles.
///
/// Expiry is lazy for backends without native TTL: implementations must
/// filter expired rows at read time and purge them opportunistically.
/// Expired rows must never surface via `get`, `get_many`, or `list`
/// (spec §4.1).
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Read a value by key. Returns `None` if absent or expired.
    async fn get(
        &self,
        key: &str,
        opts: &StorageOptions,
    ) -> Result<Option<serde_json::Value>, StorageError>;

    /// Create or overwrite a value.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        opts: &StorageOptions,
    ) -> Result<(), StorageError>;

    /// Delete a value. Returns whether a row was actually removed.
    async fn delete(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError>;

    /// Whether a (non-expired) value exists for `key`.
    async fn exists(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError> {
        Ok(self.get(key, opts).await?.is_some())
    }

    /// Batch read. Keys absent or expired are omitted from the result map.
    async fn get_many(
        &self,
        keys: &[String],
        opts: &StorageOptions,
    ) -> Result<HashMap<String, serde_json::Value>, StorageError> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(v) = self.get(key, opts).await? {
                out.insert(key.clone(), v);
            }
        }
        Ok(out)
    }

    /// Batch write. Must be atomic per-batch on backends that support
    /// transactions; on backends that don't, entries may be applied
    /// sequentially but must not leave half-written records visible
    /// through `get` for keys already written (spec §4.1).
    async fn set_many(
        &self,
        items: &[(String, serde_json::Value)],
        opts: &StorageOptions,
    ) -> Result<(), StorageError> {
        for (key, value) in items {
            self.set(key, value.clone(), opts).await?;
        }
        Ok(())
    }

    /// Batch delete. Returns the number of rows actually removed.
    async fn delete_many(&self, keys: &[String], opts: &StorageOptions) -> Result<u64, StorageError> {
        let mut count = 0;
        for key in keys {
            if self.delete(key, opts).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// List keys under a prefix within the namespace.
    async fn list(&self, prefix: &str, opts: &StorageOptions) -> Result<Vec<String>, StorageError>;

    /// Read a stored list value (e.g. a bounded window `[start, end)`).
    /// Returns `None` if the key is absent.
    async fn get_list(
        &self,
        key: &str,
        start: usize,
        end: usize,
        opts: &StorageOptions,
    ) -> Result<Option<Vec<serde_json::Value>>, StorageError>;

    /// Overwrite the stored list at `key`.
    async fn save_list(
        &self,
        key: &str,
        values: Vec<serde_json::Value>,
        opts: &StorageOptions,
    ) -> Result<(), StorageError>;

    /// Delete a stored list. Returns whether it existed.
    async fn delete_list(&self, key: &str, opts: &StorageOptions) -> Result<bool, StorageError>;

    /// Remove every row under `prefix` (or the whole namespace if `None`).
    async fn clear(&self, prefix: Option<&str>) -> Result<(), StorageError>;

    /// Capability probe: `Some` if this provider implements [`MemoryOps`].
    /// Default `None` — overridden by providers whose backend supports it
    /// (spec §4.2, DESIGN NOTES "capability-conditional methods").
    fn as_memory_ops(&self) -> Option<&dyn MemoryOps> {
        None
    }

    /// Capability probe: `Some` if this provider implements [`VectorOps`].
    fn as_vector_ops(&self) -> Option<&dyn VectorOps> {
        None
    }

    /// Release any resources held by this provider (connection pools,
    /// background tasks). Invoked once per cached instance at process
    /// shutdown by the [`crate::factory::StorageFactory`].
    async fn destroy(&self) {}
}
