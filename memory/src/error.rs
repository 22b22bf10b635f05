//! Error types for the memory pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in memory pipeline operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Missing or ambiguous provider selection in the configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A backing store failed its startup ping.
    #[error("connection error: {0}")]
    Connection(String),

    /// Embedding generation failed or produced a wrong dimension.
    #[error("embedding failed: {0}")]
    Embedding(#[source] engram_core::Error),

    /// Language model transport failure.
    #[error("llm call failed: {0}")]
    Llm(#[source] engram_core::Error),

    /// The extractor could not obtain a valid reply within its retry budget.
    #[error("extraction failed after {attempts} attempts: {reason}")]
    Extraction {
        /// Attempts consumed before giving up.
        attempts: usize,
        /// Last validation failure.
        reason: String,
    },

    /// The reconciler could not obtain a valid reply within its retry budget.
    #[error("reconciliation failed after {attempts} attempts: {reason}")]
    Reconciliation {
        /// Attempts consumed before giving up.
        attempts: usize,
        /// Last validation failure.
        reason: String,
    },

    /// Dimension mismatch between a vector and the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// Vector index operation failed.
    #[error("index error: {0}")]
    Index(String),

    /// Metadata store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// Row or vector not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate identifier on insert.
    #[error("duplicate id: {0}")]
    Duplicate(String),

    /// Persistence operation failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for memory pipeline operations.
pub type Result<T> = core::result::Result<T, MemoryError>;
