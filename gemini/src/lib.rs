//! Google Gemini provider for engram.
//!
//! Implements [`engram_core::LanguageModel`] over `generateContent` and
//! [`engram_core::EmbeddingModel`] over `embedContent` /
//! `batchEmbedContents`.
//!
//! ```rust,no_run
//! use engram_gemini::Gemini;
//!
//! let model = Gemini::new("AIza...")
//!     .with_model("gemini-2.0-flash")
//!     .with_embedding_model("text-embedding-004")
//!     .with_embedding_dimensions(768);
//! ```

mod client;
mod embedding;
mod error;
mod llm;
mod types;

pub use client::Gemini;
pub use error::GeminiError;
