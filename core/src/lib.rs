//! # engram-core
//!
//! Trait abstractions shared by the engram memory pipeline and its provider
//! crates. The memory layer itself lives in `engram-memory`; this crate only
//! describes the two external model capabilities it consumes:
//!
//! | Capability | Trait | Description |
//! |------------|-------|-------------|
//! | **Language models** | [`LanguageModel`] | Single-shot prompt completion with optional system instruction |
//! | **Embeddings** | [`EmbeddingModel`] | Convert text to fixed-dimension vectors, singly or in batches |
//!
//! Provider crates (`engram-openai`, `engram-gemini`, or your own) implement
//! these traits; everything downstream is written against them, so swapping
//! backends never touches the pipeline.
//!
//! ```rust
//! use engram_core::{EmbeddingModel, LanguageModel};
//!
//! async fn example<L, E>(llm: &L, embedder: &E) -> engram_core::Result<()>
//! where
//!     L: LanguageModel,
//!     E: EmbeddingModel,
//! {
//!     let answer = llm.complete("Say hi.", None, None).await?;
//!     let vector = embedder.embed(&answer).await?;
//!     assert_eq!(vector.len(), embedder.dim());
//!     Ok(())
//! }
//! ```

#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
/// Language model completion.
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::{Embedding, EmbeddingModel};
#[doc(inline)]
pub use llm::{GenerationConfig, LanguageModel};

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
