//! OpenAI provider for engram.
//!
//! Implements [`engram_core::LanguageModel`] over the chat completions
//! endpoint and [`engram_core::EmbeddingModel`] over `/embeddings`, including
//! true batch embedding.
//!
//! ```rust,no_run
//! use engram_openai::OpenAi;
//!
//! let model = OpenAi::new("sk-...")
//!     .with_model("gpt-4o-mini")
//!     .with_embedding_model("text-embedding-3-small")
//!     .with_embedding_dimensions(1536);
//! ```

mod client;
mod embedding;
mod error;
mod llm;

pub use client::OpenAi;
pub use error::OpenAiError;
