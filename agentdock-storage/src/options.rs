//! Options recognized by every [`crate::provider::StorageProvider`] operation
//! (spec §4.1: "`opts` recognized by all operations").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-call options: namespace scoping, TTL, and free-form metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Scopes the effective key; the provider prepends this to the key.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Sets an absolute expiry at `now + ttl_seconds`. `None` means no
    /// expiry.
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    /// Arbitrary caller metadata, not interpreted by the provider.
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl StorageOptions {
    /// Options scoped to a single namespace, no TTL.
    pub fn namespace(ns: impl Into<String>) -> Self {
        Self {
            namespace: Some(ns.into()),
            ttl_seconds: None,
            metadata: None,
        }
    }

    /// Attach a TTL (in seconds) to an existing options value.
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_builder_sets_only_namespace() {
        let opts = StorageOptions::namespace("sessions");
        assert_eq!(opts.namespace.as_deref(), Some("sessions"));
        assert!(opts.ttl_seconds.is_none());
    }

    #[test]
    fn with_ttl_is_additive() {
        let opts = StorageOptions::namespace("sessions").with_ttl(60);
        assert_eq!(opts.ttl_seconds, Some(60));
    }
}
