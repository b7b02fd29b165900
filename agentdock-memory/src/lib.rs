//! Cross-tier recall fusion (C6) and batched extraction orchestration (C7).
//!
//! Both components are built on the capability-probed [`agentdock_storage::StorageProvider`]
//! contract: neither requires a concrete backend crate, only one that
//! answers `as_memory_ops`/`as_vector_ops` truthfully.

#![deny(missing_docs)]

mod extraction;
mod recall;

pub use extraction::{BatchMetrics, ExtractionConfig, ExtractionOrchestrator, Extractor, InboundMessage, RuleBasedExtractor};
pub use recall::{RecallConfig, RecallQuery, RecallService, RecallWeights};
