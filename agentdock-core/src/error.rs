//! Error kinds surfaced by the core (spec §7).
//!
//! One `thiserror` enum per concern, the way `layer0::error` keeps a
//! separate enum per protocol rather than one grab-bag error type.
//! [`CoreError`] aggregates them for callers that want a single `Result`
//! alias, mirroring how `layer0::error::OrchError` wraps `OperatorError`.

use thiserror::Error;

/// Missing/empty user id, malformed configuration, impossible threshold.
/// Never retried; always surfaced to the caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required user id was empty or absent.
    #[error("missing or empty user id")]
    MissingUserId,

    /// A configuration value was structurally invalid (e.g. two default steps).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A numeric threshold was outside its valid range.
    #[error("invalid threshold {field}: {value} (expected {expected})")]
    InvalidThreshold {
        /// Name of the offending field.
        field: String,
        /// The value that was rejected.
        value: f64,
        /// Human-readable description of the valid range.
        expected: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Backend I/O failure. Write paths roll back; callers may retry.
/// Read paths return `absent` only where semantics allow, otherwise
/// surfaced as this error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed to complete the operation.
    #[error("backend I/O failed: {0}")]
    Backend(String),

    /// A batch write partially failed; already-committed keys are listed.
    #[error("batch write failed after committing {committed} of {attempted} entries: {reason}")]
    PartialBatch {
        /// Number of entries that committed before the failure.
        committed: usize,
        /// Number of entries attempted.
        attempted: usize,
        /// Underlying reason.
        reason: String,
    },

    /// A row could not be decoded; wraps the row's key for diagnostics.
    #[error("decode failed for key {0}")]
    Decode(#[from] DecodeError),

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// A write or read would cross user ids. Fatal at the call site; never
/// recovered from within the core.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TenancyViolation {
    /// A read for `requested` would have returned rows owned by `actual`.
    #[error("tenancy violation: requested user {requested} does not own record owned by {actual}")]
    CrossUserAccess {
        /// The user id the caller asked for.
        requested: String,
        /// The user id that actually owns the record.
        actual: String,
    },
}

/// A persisted row could not be parsed. Logged and skipped on reads;
/// reported as a [`StorageError`] on writes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stored JSON did not match the expected shape.
    #[error("malformed record at key {key}: {reason}")]
    Malformed {
        /// The key whose value failed to decode.
        key: String,
        /// Reason the decode failed.
        reason: String,
    },
}

/// Caller invoked `memory` or `vector` ops on a provider that does not
/// implement them. A programming error, not a runtime condition.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CapabilityMissing {
    /// The provider has no `MemoryOps` capability.
    #[error("provider does not implement MemoryOps")]
    Memory,

    /// The provider has no vector-search capability.
    #[error("provider does not implement VectorOps")]
    Vector,
}

/// Cooperative cancellation signal. Treated as a distinct outcome, not an
/// error — callers commonly log it rather than propagate it as a failure.
#[derive(Debug, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Aggregate error type for the core's public API.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoreError {
    /// See [`ValidationError`].
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// See [`StorageError`].
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// See [`TenancyViolation`].
    #[error("tenancy violation: {0}")]
    Tenancy(#[from] TenancyViolation),

    /// See [`CapabilityMissing`].
    #[error("capability missing: {0}")]
    Capability(#[from] CapabilityMissing),

    /// See [`Cancelled`].
    #[error("cancelled")]
    Cancelled(#[from] Cancelled),
}

/// Convenience alias for the core's fallible operations.
pub type CoreResult<T> = Result<T, CoreError>;
