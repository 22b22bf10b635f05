//! Text embedding trait.
//!
//! Embeddings are dense vector representations of text; similar texts map to
//! nearby vectors, which is what makes the memory layer's nearest-neighbor
//! reconciliation and retrieval work. This module abstracts over embedding
//! providers so the pipeline can switch between them without changing code.
//!
//! # Implementation requirements
//!
//! - [`embed`](EmbeddingModel::embed) must return vectors whose length equals
//!   [`dim`](EmbeddingModel::dim).
//! - [`embed_batch`](EmbeddingModel::embed_batch) must preserve both the
//!   order and the cardinality of its input. The default implementation
//!   embeds serially; providers with a batch endpoint should override it.

use alloc::{string::String, vec::Vec};
use core::future::Future;

/// A type alias for an embedding vector of 32-bit floats.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// # Example
///
/// ```rust
/// use engram_core::EmbeddingModel;
///
/// struct Constant {
///     dimension: usize,
/// }
///
/// impl EmbeddingModel for Constant {
///     fn dim(&self) -> usize {
///         self.dimension
///     }
///
///     async fn embed(&self, _text: &str) -> engram_core::Result<Vec<f32>> {
///         Ok(vec![0.5; self.dimension])
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let model = Constant { dimension: 8 };
/// let vector = model.embed("anything").await.unwrap();
/// assert_eq!(vector.len(), 8);
/// # });
/// ```
pub trait EmbeddingModel: Send + Sync {
    /// Returns the embedding vector dimension.
    fn dim(&self) -> usize;

    /// Converts text to an embedding vector of length [`dim`](Self::dim).
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;

    /// Converts a batch of texts to embedding vectors.
    ///
    /// Returns exactly one vector per input text, in input order. Batching is
    /// a performance hint; this default falls back to serial
    /// [`embed`](Self::embed) calls.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        async move {
            let mut embeddings = Vec::with_capacity(texts.len());
            for text in texts {
                embeddings.push(self.embed(text).await?);
            }
            Ok(embeddings)
        }
    }
}
