//! The memory service: orchestrates the write and retrieval pipelines.
//!
//! A write runs extract → batch-embed → neighbor search fan-out → one
//! reconciliation call → per-operation execution. Retrieval mirrors it:
//! embed → vector search → metadata hydration → score-ordered list. The
//! service is re-entrant; concurrent writes for different user scopes never
//! interact, because each reconciliation batch is self-contained.

use std::collections::HashMap;

use engram_core::{EmbeddingModel, LanguageModel};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::config::PipelineOptions;
use crate::error::{MemoryError, Result};
use crate::extract::Extractor;
use crate::index::{Filter, SearchHit, VectorIndex, user_filter};
use crate::model::{Memory, Turn};
use crate::reconcile::{CandidateMemory, CandidateRecord, Operation, Reconciler};
use crate::store::MetadataStore;

/// Neighbors fetched per candidate during reconciliation.
const NEIGHBOR_K: usize = 5;

/// Ceiling on concurrent neighbor searches within one write.
const MAX_SEARCH_WORKERS: usize = 10;

/// Long-term memory service over pluggable model and storage backends.
#[derive(Debug)]
pub struct MemoryService<L, E, S, V> {
    extractor: Extractor<L>,
    reconciler: Reconciler<L>,
    embedder: E,
    store: S,
    index: V,
}

impl<L, E, S, V> MemoryService<L, E, S, V>
where
    L: LanguageModel + Clone,
    E: EmbeddingModel,
    S: MetadataStore,
    V: VectorIndex,
{
    /// Connects the service with default pipeline options.
    ///
    /// Pings both stores and ensures the metadata schema; a failing ping is a
    /// connection error and nothing is constructed.
    pub async fn connect(llm: L, embedder: E, store: S, index: V) -> Result<Self> {
        Self::connect_with(llm, embedder, store, index, PipelineOptions::default()).await
    }

    /// Connects the service with explicit pipeline options.
    pub async fn connect_with(
        llm: L,
        embedder: E,
        store: S,
        index: V,
        options: PipelineOptions,
    ) -> Result<Self> {
        if !store.ping().await {
            return Err(MemoryError::Connection(
                "metadata store failed ping".to_owned(),
            ));
        }
        if !index.ping().await {
            return Err(MemoryError::Connection(
                "vector index failed ping".to_owned(),
            ));
        }
        store.ensure_schema().await?;

        let extractor = Extractor::new(llm.clone())
            .with_mode(options.extraction_mode)
            .with_max_retries(options.max_retries)
            .with_retry_delay(options.retry_delay);
        let reconciler = Reconciler::new(llm)
            .with_max_retries(options.max_retries)
            .with_retry_delay(options.retry_delay);

        Ok(Self {
            extractor,
            reconciler,
            embedder,
            store,
            index,
        })
    }

    /// Ingests one conversation exchange.
    ///
    /// Extracts candidate facts, reconciles them against the existing
    /// memories in scope, applies the resulting operations, and returns the
    /// memories that were added or updated.
    pub async fn write(
        &self,
        recent_turns: &[Turn],
        user_message: &str,
        assistant_message: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<Memory>> {
        let mut candidates = self
            .extractor
            .extract(recent_turns, user_message, assistant_message)
            .await?;
        if candidates.is_empty() {
            debug!("no candidates extracted, nothing to store");
            return Ok(Vec::new());
        }
        if let Some(user_id) = user_id {
            for candidate in &mut candidates {
                candidate.user_id = Some(user_id.to_owned());
            }
        }
        debug!(count = candidates.len(), "extracted candidate memories");

        let texts: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.content.clone())
            .collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(MemoryError::Embedding)?;
        if embeddings.len() != candidates.len() {
            return Err(MemoryError::Embedding(anyhow::anyhow!(
                "embedding count mismatch: {} embeddings for {} candidates",
                embeddings.len(),
                candidates.len()
            )));
        }
        let expected_dim = self.embedder.dim();
        for embedding in &embeddings {
            if embedding.len() != expected_dim {
                return Err(MemoryError::Embedding(anyhow::anyhow!(
                    "embedding dimension mismatch: expected {expected_dim}, got {}",
                    embedding.len()
                )));
            }
        }

        let filter = user_id.map(user_filter);
        let neighbor_sets = self.neighbor_search(&embeddings, filter.as_ref()).await?;

        let records: Vec<CandidateRecord> = candidates
            .iter()
            .zip(&neighbor_sets)
            .enumerate()
            .map(|(index, (candidate, neighbors))| CandidateRecord {
                candidate_id: format!("temp_{index}"),
                candidate_memory: CandidateMemory {
                    content: candidate.content.clone(),
                    kind: candidate.kind.clone(),
                },
                existing_memories: neighbors.iter().map(|hit| hit.payload.clone()).collect(),
            })
            .collect();

        let decisions = self.reconciler.decide(&records).await?;

        let mut stored = Vec::new();
        for (candidate, (embedding, decision)) in candidates
            .iter_mut()
            .zip(embeddings.iter().zip(&decisions))
        {
            let applied = self
                .reconciler
                .execute(decision, candidate, embedding, &self.store, &self.index)
                .await;
            if applied && matches!(decision.operation, Operation::Add | Operation::Update) {
                stored.push(candidate.clone());
            }
        }
        debug!(stored = stored.len(), "write pipeline finished");
        Ok(stored)
    }

    /// Retrieves the memories most similar to `query`.
    ///
    /// Results are ordered by descending similarity, ties broken by the
    /// search result order; at most `top_k` are returned. Hits whose metadata
    /// row has gone missing are dropped silently.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Memory>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(MemoryError::Embedding)?;
        let hits = self.index.search(&embedding, top_k, filter).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|hit| hit.memory_id.clone()).collect();
        let mut memories = self.store.get_by_ids(&ids).await?;

        let rank: HashMap<&str, (f32, usize)> = hits
            .iter()
            .enumerate()
            .map(|(position, hit)| (hit.memory_id.as_str(), (hit.score, position)))
            .collect();

        memories.retain(|memory| rank.contains_key(memory.memory_id.as_str()));
        memories.sort_by(|a, b| {
            let (score_a, position_a) = rank[a.memory_id.as_str()];
            let (score_b, position_b) = rank[b.memory_id.as_str()];
            score_b
                .total_cmp(&score_a)
                .then(position_a.cmp(&position_b))
        });
        memories.truncate(top_k);
        Ok(memories)
    }

    /// Removes every memory in the given user scope from both stores.
    ///
    /// Returns the row count reported by the metadata store.
    pub async fn forget_user(&self, user_id: &str) -> Result<u64> {
        let removed_rows = self.store.delete_all_for_user(user_id).await?;
        let removed_vectors = self.index.delete_all_for_user(user_id).await?;
        if removed_rows != removed_vectors {
            warn!(
                user_id,
                removed_rows, removed_vectors, "dual-store counts diverged while forgetting user"
            );
        }
        debug!(user_id, removed = removed_rows, "forgot user");
        Ok(removed_rows)
    }

    /// Returns a reference to the metadata store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the vector index.
    pub const fn index(&self) -> &V {
        &self.index
    }

    /// Returns a reference to the embedder.
    pub const fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Runs the per-candidate neighbor searches, bounded by
    /// [`MAX_SEARCH_WORKERS`], gathering results in candidate order. Any
    /// single failure fails the batch.
    async fn neighbor_search(
        &self,
        embeddings: &[Vec<f32>],
        filter: Option<&Filter>,
    ) -> Result<Vec<Vec<SearchHit>>> {
        let limit = embeddings.len().min(MAX_SEARCH_WORKERS);
        stream::iter(
            embeddings
                .iter()
                .map(|embedding| self.index.search(embedding, NEIGHBOR_K, filter)),
        )
        .buffered(limit)
        .try_collect()
        .await
    }
}
