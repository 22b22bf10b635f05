//! # engram
//!
//! **Long-term conversational memory with LLM-driven reconciliation.**
//!
//! Given each conversation turn, engram extracts durable facts, reconciles
//! them against what it already knows (`ADD` / `UPDATE` / `DELETE` / `NOOP`),
//! and keeps a queryable dual store — metadata rows plus a vector index —
//! that agents consult by semantic similarity on later turns.
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │  Your agent  │──▶│   MemoryService   │◀──│    Providers     │
//! │              │   │                   │   │                  │
//! │ write() per  │   │ extract→embed→    │   │ - openai         │
//! │ turn,        │   │ neighbors→decide→ │   │ - gemini         │
//! │ retrieve()   │   │ apply             │   │ - your own impl  │
//! │ on demand    │   │                   │   │                  │
//! └──────────────┘   └───────────────────┘   └──────────────────┘
//! ```
//!
//! The pipeline lives in [`engram_memory`] and is re-exported here. Provider
//! integrations are cargo features:
//!
//! | Feature  | Crate           | Backends |
//! |----------|-----------------|----------|
//! | `openai` | `engram-openai` | chat completions + `/embeddings` |
//! | `gemini` | `engram-gemini` | `generateContent` + `batchEmbedContents` |
//!
//! With at least one provider feature enabled, [`provider::connect`] builds a
//! ready service from a validated [`MemoryConfig`]:
//!
//! ```rust,ignore
//! let config = engram::MemoryConfig::from_json_str(r#"{
//!     "llm":       {"gemini": {"api_key": "...", "model": "gemini-2.0-flash"}},
//!     "embedding": {"gemini": {"api_key": "...", "dimension": 768}},
//!     "storage":   {"redb": {"path": "./memories.redb"}},
//!     "vector":    {"flat": {"dimension": 768, "index_path": "./index.bin", "metric": "COSINE"}}
//! }"#)?;
//! let service = engram::provider::connect(&config).await?;
//!
//! service.write(&[], "I'm vegetarian.", "Got it!", Some("alice")).await?;
//! let memories = service.retrieve("diet", 5, Some(&engram::user_filter("alice"))).await?;
//! ```

/// Config-driven provider selection.
#[cfg(any(feature = "openai", feature = "gemini"))]
pub mod provider;

#[doc(inline)]
pub use engram_core::{Embedding, EmbeddingModel, GenerationConfig, LanguageModel};
#[doc(inline)]
pub use engram_memory::{
    ExtractionMode, Extractor, Filter, FlatIndex, InMemoryStore, Memory, MemoryConfig,
    MemoryError, MemoryPayload, MemoryService, MemorySource, MetadataBackend, MetadataStore,
    Metric, Operation, PipelineOptions, Reconciler, RedbStore, Result, SearchHit, Turn,
    VectorIndex, user_filter,
};

#[cfg(feature = "gemini")]
pub use engram_gemini as gemini;
#[cfg(feature = "openai")]
pub use engram_openai as openai;
