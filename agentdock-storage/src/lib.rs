//! # agentdock-storage — the pluggable storage contract (spec §4.1, §4.2)
//!
//! Defines [`provider::StorageProvider`] (C1: unified KV/list contract with
//! namespacing and TTL) and its two optional capability bundles,
//! [`memory_ops::MemoryOps`] (C2: per-tier memory CRUD, recall, decay,
//! connection graph) and [`vector_ops::VectorOps`] (C2's vector-capable
//! extension). [`factory::StorageFactory`] is the process-wide
//! `(type, namespace) -> instance` registry spec §4.1 requires.
//!
//! This crate holds contracts only; see `agentdock-storage-memory` for the
//! one backend this workspace implements end to end.

#![deny(missing_docs)]

pub mod factory;
pub mod memory_ops;
pub mod options;
pub mod provider;
pub mod vector_ops;

pub use factory::{BackendConstructor, StorageFactory};
pub use memory_ops::{
    ConnectedResult, DecayOutcome, DecayRules, MemoryOps, MemoryPatch, MemoryStats, NewMemory,
    RecallOptions,
};
pub use options::StorageOptions;
pub use provider::StorageProvider;
pub use vector_ops::{Embedding, HybridSearchOptions, HybridWeights, VectorOps};
