//! Vector index: exact similarity search with payload filtering.
//!
//! [`FlatIndex`] is a brute-force index over an append-only slot arena,
//! mirroring the behavior of embedded flat indexes: deleting an entry drops
//! its id from the lookup maps but leaves the vector in the arena, so the
//! persisted blob can grow past the live-entry count until an operator
//! rebuilds it. Updates re-append under a fresh slot while keeping the
//! external id stable.
//!
//! Mutations are serialized behind a write lock and every mutating operation
//! persists both artifacts before returning: the rkyv-encoded vector blob at
//! the configured path, and a JSON side-table (payloads and id/slot maps) at
//! the same path with a `.payloads` suffix. Searches run under a read lock
//! against a consistent snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rkyv::rancor::Error as RkyvError;
use rkyv::{from_bytes, to_bytes};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FlatVectorConfig;
use crate::error::{MemoryError, Result};
use crate::model::MemoryPayload;

/// Conjunction of equality predicates over payload fields.
pub type Filter = BTreeMap<String, String>;

/// A filter scoping results to a single user.
#[must_use]
pub fn user_filter(user_id: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert("user_id".to_owned(), user_id.to_owned());
    filter
}

/// Similarity metric used by the index.
///
/// Whatever the metric, the exposed score is "larger = more similar" so
/// callers can sort uniformly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    /// Euclidean distance `d`, exposed as `1 / (1 + d)`.
    #[default]
    L2,
    /// Raw inner product.
    Ip,
    /// Inner product over L2-normalized vectors, clamped to `[0, 1]`.
    Cosine,
}

impl Metric {
    /// Scores a stored vector against the (already normalized, for cosine)
    /// query vector.
    fn score(self, query: &[f32], vector: &[f32]) -> f32 {
        match self {
            Self::L2 => 1.0 / (1.0 + l2_distance(query, vector)),
            Self::Ip => dot(query, vector),
            Self::Cosine => dot(query, vector).clamp(0.0, 1.0),
        }
    }
}

/// A single search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Vector id, equal to the metadata row's `memory_id`.
    pub memory_id: String,
    /// Similarity score; larger is more similar.
    pub score: f32,
    /// Payload stored alongside the vector.
    pub payload: MemoryPayload,
}

/// Insert/update/delete/search over `(id, vector, payload)` triples.
///
/// Implementations may reject unsupported filter keys but must honor
/// `user_id`.
pub trait VectorIndex: Send + Sync {
    /// Makes a fresh id searchable. Duplicate ids are rejected.
    fn insert(
        &self,
        id: &str,
        vector: &[f32],
        payload: MemoryPayload,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replaces the vector and/or payload of an existing id.
    ///
    /// Either field may be omitted. A vector replacement may be implemented
    /// as remove-and-add; the id stays stable externally.
    fn update(
        &self,
        id: &str,
        vector: Option<&[f32]>,
        payload: Option<MemoryPayload>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Removes an id from search results.
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns at most `top_k` hits sorted by decreasing score.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;

    /// Removes every entry whose payload is scoped to `user_id`; returns the
    /// count removed.
    fn delete_all_for_user(&self, user_id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// True iff the index is initialized with its configured dimension.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}

/// Persisted vector arena.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
struct VectorBlob {
    dimension: u32,
    vectors: Vec<Vec<f32>>,
}

/// Owned side-table, as loaded from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SideTable {
    payloads: HashMap<String, MemoryPayload>,
    id_to_slot: HashMap<String, usize>,
    slot_to_id: HashMap<usize, String>,
    next_slot: usize,
}

/// Borrowed side-table, as written to disk.
#[derive(Serialize)]
struct SideTableRef<'a> {
    payloads: &'a HashMap<String, MemoryPayload>,
    id_to_slot: &'a HashMap<String, usize>,
    slot_to_id: &'a HashMap<usize, String>,
    next_slot: usize,
}

/// Internal state guarded by the index lock.
#[derive(Debug, Default)]
struct IndexState {
    vectors: Vec<Vec<f32>>,
    payloads: HashMap<String, MemoryPayload>,
    id_to_slot: HashMap<String, usize>,
    slot_to_id: HashMap<usize, String>,
    next_slot: usize,
}

/// Exact (brute-force) vector index with metric-aware scoring.
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    path: Option<PathBuf>,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("FlatIndex")
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("path", &self.path)
            .field("len", &state.id_to_slot.len())
            .finish()
    }
}

impl FlatIndex {
    /// Creates an ephemeral index with no on-disk persistence.
    pub fn in_memory(dimension: usize, metric: Metric) -> Result<Self> {
        if dimension == 0 {
            return Err(MemoryError::Config(
                "vector index dimension must be positive".to_owned(),
            ));
        }
        Ok(Self {
            dimension,
            metric,
            path: None,
            state: RwLock::new(IndexState::default()),
        })
    }

    /// Opens (or creates) a persistent index at `path`.
    ///
    /// The blob lives at `path` and the side-table at `path` + `.payloads`;
    /// both are reloaded if present. Mappings that point past the stored
    /// vectors (a crash between saves) are dropped.
    pub fn open(dimension: usize, metric: Metric, path: impl Into<PathBuf>) -> Result<Self> {
        if dimension == 0 {
            return Err(MemoryError::Config(
                "vector index dimension must be positive".to_owned(),
            ));
        }
        let path = path.into();
        let state = load_state(&path, dimension)?;
        debug!(
            path = %path.display(),
            live = state.id_to_slot.len(),
            slots = state.vectors.len(),
            "opened flat index"
        );
        Ok(Self {
            dimension,
            metric,
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// Builds an index from its configuration section.
    pub fn from_config(config: &FlatVectorConfig) -> Result<Self> {
        match &config.index_path {
            Some(path) => Self::open(config.dimension, config.metric, path),
            None => Self::in_memory(config.dimension, config.metric),
        }
    }

    /// Returns the number of live (searchable) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().id_to_slot.len()
    }

    /// Returns `true` if no entry is searchable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of arena slots, including dead ones.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.state.read().vectors.len()
    }

    /// Returns the configured dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the configured metric.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }

    fn stored_form(&self, vector: &[f32]) -> Vec<f32> {
        if self.metric == Metric::Cosine {
            normalize(vector)
        } else {
            vector.to_vec()
        }
    }

    fn append_slot(state: &mut IndexState, id: &str, vector: Vec<f32>) {
        let slot = state.vectors.len();
        state.vectors.push(vector);
        state.id_to_slot.insert(id.to_owned(), slot);
        state.slot_to_id.insert(slot, id.to_owned());
        state.next_slot = slot + 1;
    }

    fn persist(&self, state: &IndexState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MemoryError::Persistence {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let blob = VectorBlob {
            dimension: self.dimension as u32,
            vectors: state.vectors.clone(),
        };
        let bytes = to_bytes::<RkyvError>(&blob)
            .map_err(|error| MemoryError::Serialization(error.to_string()))?;
        fs::write(path, &bytes).map_err(|source| MemoryError::Persistence {
            path: path.clone(),
            source,
        })?;

        let side = SideTableRef {
            payloads: &state.payloads,
            id_to_slot: &state.id_to_slot,
            slot_to_id: &state.slot_to_id,
            next_slot: state.next_slot,
        };
        let text = serde_json::to_string(&side)
            .map_err(|error| MemoryError::Serialization(error.to_string()))?;
        let side_path = side_table_path(path);
        fs::write(&side_path, text).map_err(|source| MemoryError::Persistence {
            path: side_path.clone(),
            source,
        })?;
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    async fn insert(&self, id: &str, vector: &[f32], payload: MemoryPayload) -> Result<()> {
        self.check_dimension(vector)?;
        let mut state = self.state.write();
        if state.id_to_slot.contains_key(id) {
            return Err(MemoryError::Duplicate(id.to_owned()));
        }
        let stored = self.stored_form(vector);
        Self::append_slot(&mut state, id, stored);
        state.payloads.insert(id.to_owned(), payload);
        self.persist(&state)
    }

    async fn update(
        &self,
        id: &str,
        vector: Option<&[f32]>,
        payload: Option<MemoryPayload>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let Some(&slot) = state.id_to_slot.get(id) else {
            return Err(MemoryError::NotFound(id.to_owned()));
        };
        if let Some(vector) = vector {
            self.check_dimension(vector)?;
            // The old slot stays in the arena; the id moves to a fresh one.
            state.slot_to_id.remove(&slot);
            let stored = self.stored_form(vector);
            Self::append_slot(&mut state, id, stored);
        }
        if let Some(payload) = payload {
            state.payloads.insert(id.to_owned(), payload);
        }
        self.persist(&state)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        let Some(slot) = state.id_to_slot.remove(id) else {
            return Err(MemoryError::NotFound(id.to_owned()));
        };
        state.slot_to_id.remove(&slot);
        state.payloads.remove(id);
        self.persist(&state)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;
        let state = self.state.read();
        if top_k == 0 || state.id_to_slot.is_empty() {
            return Ok(Vec::new());
        }

        let normalized;
        let query = if self.metric == Metric::Cosine {
            normalized = normalize(query);
            normalized.as_slice()
        } else {
            query
        };

        let mut results = Vec::new();
        for (slot, vector) in state.vectors.iter().enumerate() {
            let Some(id) = state.slot_to_id.get(&slot) else {
                continue;
            };
            let Some(payload) = state.payloads.get(id) else {
                continue;
            };
            if let Some(filter) = filter {
                // `type` is not a filterable key and is stripped here.
                let matches = filter
                    .iter()
                    .filter(|(key, _)| key.as_str() != "type")
                    .all(|(key, value)| payload.field_matches(key, value));
                if !matches {
                    continue;
                }
            }
            results.push(SearchHit {
                memory_id: id.clone(),
                score: self.metric.score(query, vector),
                payload: payload.clone(),
            });
        }

        // Stable sort: equal scores keep insertion (slot) order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let mut state = self.state.write();
        let ids: Vec<String> = state
            .payloads
            .iter()
            .filter(|(_, payload)| payload.user_id.as_deref() == Some(user_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            if let Some(slot) = state.id_to_slot.remove(id) {
                state.slot_to_id.remove(&slot);
            }
            state.payloads.remove(id);
        }
        self.persist(&state)?;
        debug!(user_id, removed = ids.len(), "cleared user scope from index");
        Ok(ids.len() as u64)
    }

    async fn ping(&self) -> bool {
        self.dimension > 0
    }
}

fn load_state(path: &Path, dimension: usize) -> Result<IndexState> {
    let mut state = IndexState::default();

    if path.exists() {
        let bytes = fs::read(path).map_err(|source| MemoryError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(state);
        }
        let blob: VectorBlob = from_bytes::<VectorBlob, RkyvError>(&bytes)
            .map_err(|error| MemoryError::Serialization(error.to_string()))?;
        if blob.dimension as usize != dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: blob.dimension as usize,
            });
        }
        state.vectors = blob.vectors;
    }

    let side_path = side_table_path(path);
    if side_path.exists() {
        let text = fs::read_to_string(&side_path).map_err(|source| MemoryError::Persistence {
            path: side_path.clone(),
            source,
        })?;
        let side: SideTable = serde_json::from_str(&text)
            .map_err(|error| MemoryError::Serialization(error.to_string()))?;
        state.payloads = side.payloads;
        state.id_to_slot = side.id_to_slot;
        state.slot_to_id = side.slot_to_id;
        state.next_slot = side.next_slot;
    }

    // Drop mappings that point past the stored vectors (mutations lost
    // between the two writes are tolerated).
    let live = state.vectors.len();
    state.id_to_slot.retain(|id, slot| {
        if *slot < live {
            true
        } else {
            warn!(id, slot, "dropping mapping past the persisted arena");
            false
        }
    });
    state.slot_to_id.retain(|slot, _| *slot < live);
    state
        .payloads
        .retain(|id, _| state.id_to_slot.contains_key(id));
    state.next_slot = live;

    Ok(state)
}

fn side_table_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".payloads");
    PathBuf::from(name)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = dot(vector, vector).sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|value| value / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Memory, MemorySource};
    use tempfile::tempdir;

    fn payload(id: &str, content: &str, user_id: Option<&str>) -> MemoryPayload {
        let mut memory = Memory::new(MemorySource::UserMessage, content, "fact");
        memory.memory_id = id.to_owned();
        memory.user_id = user_id.map(str::to_owned);
        memory.payload()
    }

    #[tokio::test]
    async fn insert_and_search() {
        let index = FlatIndex::in_memory(4, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0, 0.0, 0.0], payload("a", "tea", None))
            .await
            .unwrap();
        index
            .insert("b", &[0.0, 1.0, 0.0, 0.0], payload("b", "coffee", None))
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.1, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory_id, "a");
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let index = FlatIndex::in_memory(2, Metric::L2).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "x", None))
            .await
            .unwrap();
        let error = index
            .insert("a", &[0.0, 1.0], payload("a", "y", None))
            .await
            .unwrap_err();
        assert!(matches!(error, MemoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn dimension_mismatch_fails() {
        let index = FlatIndex::in_memory(4, Metric::L2).unwrap();
        let error = index
            .insert("a", &[1.0, 0.0], payload("a", "x", None))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            MemoryError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        let error = index.search(&[1.0], 5, None).await.unwrap_err();
        assert!(matches!(error, MemoryError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn l2_score_is_inverse_distance() {
        let index = FlatIndex::in_memory(2, Metric::L2).unwrap();
        index
            .insert("a", &[0.0, 0.0], payload("a", "origin", None))
            .await
            .unwrap();

        let hits = index.search(&[3.0, 4.0], 1, None).await.unwrap();
        // distance 5 => score 1 / 6
        assert!((hits[0].score - 1.0 / 6.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn cosine_score_is_clamped() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "x", None))
            .await
            .unwrap();

        let hits = index.search(&[-1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn update_keeps_external_id_and_grows_arena() {
        let index = FlatIndex::in_memory(2, Metric::Ip).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "before", None))
            .await
            .unwrap();

        index
            .update("a", Some(&[0.0, 1.0]), Some(payload("a", "after", None)))
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.slot_count(), 2);

        let hits = index.search(&[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].memory_id, "a");
        assert_eq!(hits[0].payload.content, "after");
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found() {
        let index = FlatIndex::in_memory(2, Metric::L2).unwrap();
        let error = index.update("ghost", None, None).await.unwrap_err();
        assert!(matches!(error, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_ids_are_not_returned() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "x", None))
            .await
            .unwrap();
        index.delete("a").await.unwrap();

        assert!(index.is_empty());
        // The arena keeps the dead slot.
        assert_eq!(index.slot_count(), 1);
        let hits = index.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn user_filter_scopes_results() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "tea", Some("alice")))
            .await
            .unwrap();
        index
            .insert("b", &[1.0, 0.0], payload("b", "tea", Some("bob")))
            .await
            .unwrap();

        let hits = index
            .search(&[1.0, 0.0], 10, Some(&user_filter("alice")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn type_key_in_filter_is_ignored() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "tea", Some("alice")))
            .await
            .unwrap();

        let mut filter = user_filter("alice");
        filter.insert("type".to_owned(), "no_such_type".to_owned());
        let hits = index.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn unknown_filter_key_matches_nothing() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "tea", None))
            .await
            .unwrap();

        let mut filter = Filter::new();
        filter.insert("favorite_color".to_owned(), "green".to_owned());
        let hits = index.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_all_for_user_counts() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("a", &[1.0, 0.0], payload("a", "tea", Some("alice")))
            .await
            .unwrap();
        index
            .insert("b", &[0.0, 1.0], payload("b", "hiking", Some("alice")))
            .await
            .unwrap();
        index
            .insert("c", &[1.0, 0.0], payload("c", "tea", Some("bob")))
            .await
            .unwrap();

        let removed = index.delete_all_for_user("alice").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn results_are_sorted_and_truncated() {
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        index
            .insert("far", &[0.0, 1.0], payload("far", "x", None))
            .await
            .unwrap();
        index
            .insert("near", &[1.0, 0.0], payload("near", "y", None))
            .await
            .unwrap();
        index
            .insert("mid", &[1.0, 1.0], payload("mid", "z", None))
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory_id, "near");
        assert_eq!(hits[1].memory_id, "mid");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.bin");

        {
            let index = FlatIndex::open(2, Metric::Cosine, &path).unwrap();
            index
                .insert("a", &[1.0, 0.0], payload("a", "tea", Some("alice")))
                .await
                .unwrap();
            index
                .insert("b", &[0.0, 1.0], payload("b", "hiking", None))
                .await
                .unwrap();
            index.delete("b").await.unwrap();
        }

        let reloaded = FlatIndex::open(2, Metric::Cosine, &path).unwrap();
        assert_eq!(reloaded.len(), 1);
        // Dead slots survive the round-trip.
        assert_eq!(reloaded.slot_count(), 2);

        let hits = reloaded.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory_id, "a");
        assert_eq!(hits[0].payload.content, "tea");
    }

    #[tokio::test]
    async fn reopening_with_wrong_dimension_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.bin");

        {
            let index = FlatIndex::open(2, Metric::L2, &path).unwrap();
            index
                .insert("a", &[1.0, 0.0], payload("a", "x", None))
                .await
                .unwrap();
        }

        let error = FlatIndex::open(3, Metric::L2, &path).unwrap_err();
        assert!(matches!(error, MemoryError::DimensionMismatch { .. }));
    }
}
