//! Long-term memory pipeline for conversational agents.
//!
//! Given a conversation turn (the latest user message, the latest assistant
//! reply, and the recent history), the pipeline extracts durable facts,
//! deduplicates them against what is already stored, and keeps a queryable
//! store a downstream agent can consult by semantic similarity.
//!
//! The write path runs extraction (one model call), batch embedding,
//! per-candidate nearest-neighbor lookup, a single model-driven
//! reconciliation decision (`ADD` / `UPDATE` / `DELETE` / `NOOP` per
//! candidate), and a dual-store mutation across the metadata store and the
//! vector index. The retrieval path is its mirror image: embed the query,
//! search the index, hydrate rows, rank by score.
//!
//! [`MemoryService`] owns the orchestration and the user scoping; the
//! collaborators plug in through four seams:
//! - [`engram_core::LanguageModel`] and [`engram_core::EmbeddingModel`] for
//!   the model backends,
//! - [`MetadataStore`] for durable rows ([`InMemoryStore`], [`RedbStore`]),
//! - [`VectorIndex`] for similarity search ([`FlatIndex`]).
//!
//! ```rust,no_run
//! use engram_memory::{FlatIndex, InMemoryStore, MemoryService, Metric, user_filter};
//! # async fn demo(llm: impl engram_core::LanguageModel + Clone,
//! #               embedder: impl engram_core::EmbeddingModel) -> engram_memory::Result<()> {
//! let store = InMemoryStore::new();
//! let index = FlatIndex::in_memory(768, Metric::Cosine)?;
//! let service = MemoryService::connect(llm, embedder, store, index).await?;
//!
//! service
//!     .write(&[], "I'm vegetarian.", "Got it!", Some("alice"))
//!     .await?;
//! let memories = service
//!     .retrieve("diet", 5, Some(&user_filter("alice")))
//!     .await?;
//! # let _ = memories;
//! # Ok(())
//! # }
//! ```

/// Nested service configuration and pipeline tunables.
pub mod config;
/// Error types.
pub mod error;
/// Extraction of candidate memories from conversation turns.
pub mod extract;
/// Vector index trait and the flat exact-search implementation.
pub mod index;
/// Memory, payload, and turn data types.
pub mod model;
pub(crate) mod prompts;
/// Reconciliation decisions and their dual-store execution.
pub mod reconcile;
/// The orchestrating memory service.
pub mod service;
/// Metadata store trait and implementations.
pub mod store;

#[doc(inline)]
pub use config::{MemoryConfig, PipelineOptions};
#[doc(inline)]
pub use error::{MemoryError, Result};
#[doc(inline)]
pub use extract::{ExtractionMode, Extractor};
#[doc(inline)]
pub use index::{Filter, FlatIndex, Metric, SearchHit, VectorIndex, user_filter};
#[doc(inline)]
pub use model::{Memory, MemoryPayload, MemorySource, Turn};
#[doc(inline)]
pub use reconcile::{CandidateRecord, Decision, Operation, Reconciler};
#[doc(inline)]
pub use service::MemoryService;
#[doc(inline)]
pub use store::{InMemoryStore, MetadataBackend, MetadataStore, RedbStore};
