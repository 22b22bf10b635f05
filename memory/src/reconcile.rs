//! Reconciliation stage: decide ADD/UPDATE/DELETE/NOOP per candidate and
//! apply the decisions across both stores.
//!
//! One model call covers the whole candidate batch, at temperature zero.
//! Structural failures (bad JSON, missing fields, unknown operation names)
//! retry; semantic problems degrade safely — an UPDATE/DELETE whose target is
//! missing or outside the candidate's neighbor set becomes a NOOP, candidates
//! the model skipped default to NOOP, and entries for unknown candidate ids
//! are discarded.

use std::collections::HashMap;
use std::time::Duration;

use async_io::Timer;
use engram_core::{GenerationConfig, LanguageModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MemoryError, Result};
use crate::index::VectorIndex;
use crate::model::{Memory, MemoryPayload};
use crate::prompts;
use crate::store::MetadataStore;

/// The reconciler's verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Store the candidate as a new memory.
    Add,
    /// Fold the candidate into an existing memory, reusing its id.
    Update,
    /// Remove an existing memory the candidate contradicts.
    Delete,
    /// Skip the candidate.
    Noop,
}

/// The candidate's content as shown to the model.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateMemory {
    /// The factual statement.
    pub content: String,
    /// Category label.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A candidate plus the neighbor payloads it is judged against.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRecord {
    /// Transient correlator ("temp_0", "temp_1", ...), valid for one batch.
    pub candidate_id: String,
    /// The candidate under judgment.
    pub candidate_memory: CandidateMemory,
    /// Nearest-neighbor payloads from the vector index, best first.
    pub existing_memories: Vec<MemoryPayload>,
}

/// One validated per-candidate decision, aligned with the request order.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Correlator echoed from the request.
    pub candidate_id: String,
    /// Operation to execute.
    pub operation: Operation,
    /// Target memory for `UPDATE`/`DELETE`; always within the candidate's
    /// neighbor set.
    pub target_memory_id: Option<String>,
    /// Model-reported confidence, clamped to `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    candidate_id: String,
    operation: Operation,
    target_memory_id: Option<String>,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct OperationsReply {
    operations: Vec<RawDecision>,
}

/// Decides and executes reconciliation operations (one model call per batch).
#[derive(Debug, Clone)]
pub struct Reconciler<L> {
    llm: L,
    max_retries: usize,
    retry_delay: Duration,
}

impl<L: LanguageModel> Reconciler<L> {
    /// Creates a reconciler with the default retry policy.
    #[must_use]
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Sets the attempt budget (minimum 1).
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = if max_retries == 0 { 1 } else { max_retries };
        self
    }

    /// Sets the fixed sleep between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Asks the model for one operation per candidate.
    ///
    /// The returned list is aligned with `records`: exactly one decision per
    /// record, in record order, gap-filled with NOOP where the model skipped
    /// a candidate.
    pub async fn decide(&self, records: &[CandidateRecord]) -> Result<Vec<Decision>> {
        let candidates_json = serde_json::to_string_pretty(records)
            .map_err(|error| MemoryError::Serialization(error.to_string()))?;
        let prompt = prompts::operations_prompt(&candidates_json);
        let config = GenerationConfig::deterministic();

        let mut last_reason = String::new();
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                debug!(attempt, max = self.max_retries, "retrying reconciliation");
                Timer::after(self.retry_delay).await;
            }

            let reply = match self.llm.complete(&prompt, None, Some(&config)).await {
                Ok(reply) => reply,
                Err(error) => {
                    warn!(%error, attempt, "reconciliation model call failed");
                    if attempt == self.max_retries {
                        return Err(MemoryError::Llm(error));
                    }
                    last_reason = error.to_string();
                    continue;
                }
            };

            match serde_json::from_str::<OperationsReply>(prompts::strip_code_fences(&reply)) {
                Ok(parsed) => return Ok(align(records, parsed.operations)),
                Err(error) => {
                    warn!(%error, attempt, "reconciliation reply failed validation");
                    last_reason = error.to_string();
                }
            }
        }

        Err(MemoryError::Reconciliation {
            attempts: self.max_retries,
            reason: last_reason,
        })
    }

    /// Applies one decision to both stores.
    ///
    /// Returns `true` iff the operation fully succeeded. On UPDATE the
    /// candidate's transient id is overwritten with the target id.
    pub async fn execute<S, V>(
        &self,
        decision: &Decision,
        memory: &mut Memory,
        embedding: &[f32],
        store: &S,
        index: &V,
    ) -> bool
    where
        S: MetadataStore,
        V: VectorIndex,
    {
        match decision.operation {
            Operation::Add => execute_add(memory, embedding, store, index).await,
            Operation::Update => {
                let Some(target) = decision.target_memory_id.as_deref() else {
                    warn!(candidate_id = %decision.candidate_id, "update without target");
                    return false;
                };
                execute_update(target, memory, embedding, store, index).await
            }
            Operation::Delete => {
                let Some(target) = decision.target_memory_id.as_deref() else {
                    warn!(candidate_id = %decision.candidate_id, "delete without target");
                    return false;
                };
                execute_delete(target, store, index).await
            }
            Operation::Noop => {
                debug!(candidate_id = %decision.candidate_id, "noop");
                true
            }
        }
    }
}

/// Validates raw decisions against the request and aligns them to its order.
fn align(records: &[CandidateRecord], raw: Vec<RawDecision>) -> Vec<Decision> {
    if raw.len() != records.len() {
        warn!(
            expected = records.len(),
            got = raw.len(),
            "operations count mismatch"
        );
    }

    let positions: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(position, record)| (record.candidate_id.as_str(), position))
        .collect();

    // Every candidate defaults to NOOP until the model says otherwise.
    let mut decisions: Vec<Decision> = records
        .iter()
        .map(|record| Decision {
            candidate_id: record.candidate_id.clone(),
            operation: Operation::Noop,
            target_memory_id: None,
            confidence: 0.0,
        })
        .collect();

    for entry in raw {
        let Some(&position) = positions.get(entry.candidate_id.as_str()) else {
            warn!(candidate_id = %entry.candidate_id, "discarding decision for unknown candidate");
            continue;
        };

        let (operation, target) = match entry.operation {
            Operation::Update | Operation::Delete => {
                let neighbors = &records[position].existing_memories;
                match entry.target_memory_id {
                    Some(target)
                        if neighbors.iter().any(|payload| payload.memory_id == target) =>
                    {
                        (entry.operation, Some(target))
                    }
                    other => {
                        warn!(
                            candidate_id = %entry.candidate_id,
                            operation = ?entry.operation,
                            target = ?other,
                            "invalid_target: downgrading to NOOP"
                        );
                        (Operation::Noop, None)
                    }
                }
            }
            // A non-null target on ADD/NOOP is ignored.
            Operation::Add | Operation::Noop => (entry.operation, None),
        };

        decisions[position] = Decision {
            candidate_id: entry.candidate_id,
            operation,
            target_memory_id: target,
            confidence: entry.confidence.clamp(0.0, 1.0),
        };
    }

    decisions
}

async fn execute_add<S, V>(memory: &mut Memory, embedding: &[f32], store: &S, index: &V) -> bool
where
    S: MetadataStore,
    V: VectorIndex,
{
    memory.embedding = Some(embedding.to_vec());
    if let Err(error) = store.insert(memory).await {
        warn!(memory_id = %memory.memory_id, %error, "metadata insert failed");
        return false;
    }
    if let Err(error) = index.insert(&memory.memory_id, embedding, memory.payload()).await {
        warn!(memory_id = %memory.memory_id, %error, "vector insert failed, removing row");
        if let Err(error) = store.delete(&memory.memory_id).await {
            warn!(memory_id = %memory.memory_id, %error, "compensating delete failed");
        }
        return false;
    }
    debug!(memory_id = %memory.memory_id, "added memory");
    true
}

async fn execute_update<S, V>(
    target: &str,
    memory: &mut Memory,
    embedding: &[f32],
    store: &S,
    index: &V,
) -> bool
where
    S: MetadataStore,
    V: VectorIndex,
{
    // The candidate's transient id is discarded; the target id is reused.
    memory.memory_id = target.to_owned();
    memory.embedding = Some(embedding.to_vec());
    if let Err(error) = store.update(memory).await {
        warn!(memory_id = %target, %error, "metadata update failed");
        return false;
    }
    if let Err(error) = index
        .update(target, Some(embedding), Some(memory.payload()))
        .await
    {
        // The row stays updated; the stores disagree until the next
        // reconciliation touches this memory.
        warn!(memory_id = %target, %error, "inconsistent_update: vector update failed");
        return false;
    }
    debug!(memory_id = %target, "updated memory");
    true
}

async fn execute_delete<S, V>(target: &str, store: &S, index: &V) -> bool
where
    S: MetadataStore,
    V: VectorIndex,
{
    let row_ok = match store.delete(target).await {
        Ok(_) => true,
        Err(error) => {
            warn!(memory_id = %target, %error, "metadata delete failed");
            false
        }
    };
    let vector_ok = match index.delete(target).await {
        Ok(()) => true,
        Err(error) => {
            warn!(memory_id = %target, %error, "vector delete failed");
            false
        }
    };
    if row_ok && vector_ok {
        debug!(memory_id = %target, "deleted memory");
        true
    } else {
        warn!(
            memory_id = %target,
            row_ok,
            vector_ok,
            "inconsistent_delete: one-sided deletion"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FlatIndex, Filter, Metric, SearchHit};
    use crate::model::MemorySource;
    use crate::store::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct ScriptedModel {
        replies: Arc<Mutex<VecDeque<String>>>,
        last_temperature: Arc<Mutex<Option<f32>>>,
    }

    impl ScriptedModel {
        fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(
                    replies.into_iter().map(str::to_owned).collect(),
                )),
                last_temperature: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _prompt: &str,
            _system: Option<&str>,
            config: Option<&GenerationConfig>,
        ) -> engram_core::Result {
            *self.last_temperature.lock().unwrap() = config.and_then(|c| c.temperature);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }
    }

    fn record(candidate_id: &str, content: &str, neighbors: &[&str]) -> CandidateRecord {
        CandidateRecord {
            candidate_id: candidate_id.to_owned(),
            candidate_memory: CandidateMemory {
                content: content.to_owned(),
                kind: "fact".to_owned(),
            },
            existing_memories: neighbors
                .iter()
                .map(|id| {
                    let mut memory = Memory::new(MemorySource::UserMessage, "existing", "fact");
                    memory.memory_id = (*id).to_owned();
                    memory.payload()
                })
                .collect(),
        }
    }

    fn reconciler(replies: impl IntoIterator<Item = &'static str>) -> Reconciler<ScriptedModel> {
        Reconciler::new(ScriptedModel::new(replies)).with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn decide_runs_at_temperature_zero() {
        let model = ScriptedModel::new([
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"ADD\", \"target_memory_id\": null, \"confidence\": 0.9}]}",
        ]);
        let reconciler = Reconciler::new(model.clone()).with_retry_delay(Duration::ZERO);

        let decisions = reconciler.decide(&[record("temp_0", "x", &[])]).await.unwrap();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].operation, Operation::Add);
        assert_eq!(*model.last_temperature.lock().unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn update_target_outside_neighbors_is_downgraded() {
        let reconciler = reconciler([
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"UPDATE\", \"target_memory_id\": \"stranger\", \"confidence\": 0.9}]}",
        ]);

        let decisions = reconciler
            .decide(&[record("temp_0", "x", &["m1"])])
            .await
            .unwrap();

        assert_eq!(decisions[0].operation, Operation::Noop);
        assert!(decisions[0].target_memory_id.is_none());
    }

    #[tokio::test]
    async fn delete_with_null_target_is_downgraded() {
        let reconciler = reconciler([
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"DELETE\", \"target_memory_id\": null, \"confidence\": 0.9}]}",
        ]);

        let decisions = reconciler
            .decide(&[record("temp_0", "x", &["m1"])])
            .await
            .unwrap();

        assert_eq!(decisions[0].operation, Operation::Noop);
    }

    #[tokio::test]
    async fn target_on_add_is_ignored() {
        let reconciler = reconciler([
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"ADD\", \"target_memory_id\": \"m1\", \"confidence\": 0.9}]}",
        ]);

        let decisions = reconciler
            .decide(&[record("temp_0", "x", &["m1"])])
            .await
            .unwrap();

        assert_eq!(decisions[0].operation, Operation::Add);
        assert!(decisions[0].target_memory_id.is_none());
    }

    #[tokio::test]
    async fn missing_candidates_default_to_noop_and_unknown_ids_are_discarded() {
        let reconciler = reconciler([
            "{\"operations\": [{\"candidate_id\": \"temp_1\", \"operation\": \"ADD\", \"target_memory_id\": null, \"confidence\": 0.8}, {\"candidate_id\": \"temp_9\", \"operation\": \"DELETE\", \"target_memory_id\": \"m1\", \"confidence\": 0.8}]}",
        ]);

        let decisions = reconciler
            .decide(&[record("temp_0", "a", &[]), record("temp_1", "b", &[])])
            .await
            .unwrap();

        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].candidate_id, "temp_0");
        assert_eq!(decisions[0].operation, Operation::Noop);
        assert_eq!(decisions[1].operation, Operation::Add);
    }

    #[tokio::test]
    async fn structural_failure_is_retried_then_fails() {
        let reconciler = reconciler([
            "no json",
            "{\"operations\": \"not a list\"}",
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"MERGE\", \"target_memory_id\": null, \"confidence\": 1.0}]}",
        ]);

        let error = reconciler
            .decide(&[record("temp_0", "x", &[])])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            MemoryError::Reconciliation { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn confidence_is_clamped() {
        let reconciler = reconciler([
            "{\"operations\": [{\"candidate_id\": \"temp_0\", \"operation\": \"ADD\", \"target_memory_id\": null, \"confidence\": 3.5}]}",
        ]);

        let decisions = reconciler.decide(&[record("temp_0", "x", &[])]).await.unwrap();
        assert!((decisions[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    fn decision(operation: Operation, target: Option<&str>) -> Decision {
        Decision {
            candidate_id: "temp_0".to_owned(),
            operation,
            target_memory_id: target.map(str::to_owned),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn execute_add_writes_both_stores() {
        let reconciler = reconciler([]);
        let store = InMemoryStore::new();
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();
        let mut memory = Memory::new(MemorySource::UserMessage, "User is vegetarian", "fact");

        let ok = reconciler
            .execute(&decision(Operation::Add, None), &mut memory, &[1.0, 0.0], &store, &index)
            .await;

        assert!(ok);
        assert_eq!(store.len(), 1);
        assert_eq!(index.len(), 1);
        assert!(memory.embedding.is_some());
    }

    /// An index that refuses every mutation.
    struct BrokenIndex;

    impl VectorIndex for BrokenIndex {
        async fn insert(&self, _: &str, _: &[f32], _: MemoryPayload) -> crate::error::Result<()> {
            Err(MemoryError::Index("broken".to_owned()))
        }
        async fn update(
            &self,
            _: &str,
            _: Option<&[f32]>,
            _: Option<MemoryPayload>,
        ) -> crate::error::Result<()> {
            Err(MemoryError::Index("broken".to_owned()))
        }
        async fn delete(&self, _: &str) -> crate::error::Result<()> {
            Err(MemoryError::Index("broken".to_owned()))
        }
        async fn search(
            &self,
            _: &[f32],
            _: usize,
            _: Option<&Filter>,
        ) -> crate::error::Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
        async fn delete_all_for_user(&self, _: &str) -> crate::error::Result<u64> {
            Ok(0)
        }
        async fn ping(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn failed_vector_insert_compensates_the_row() {
        let reconciler = reconciler([]);
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemorySource::UserMessage, "x", "fact");

        let ok = reconciler
            .execute(
                &decision(Operation::Add, None),
                &mut memory,
                &[1.0, 0.0],
                &store,
                &BrokenIndex,
            )
            .await;

        assert!(!ok);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn execute_update_reuses_target_id() {
        let reconciler = reconciler([]);
        let store = InMemoryStore::new();
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();

        let original = Memory::new(MemorySource::UserMessage, "User lives in Delhi", "location");
        let target_id = original.memory_id.clone();
        store.insert(&original).await.unwrap();
        index
            .insert(&target_id, &[1.0, 0.0], original.payload())
            .await
            .unwrap();

        let mut candidate =
            Memory::new(MemorySource::UserMessage, "User lives in Bangalore", "location");

        let ok = reconciler
            .execute(
                &decision(Operation::Update, Some(&target_id)),
                &mut candidate,
                &[0.0, 1.0],
                &store,
                &index,
            )
            .await;

        assert!(ok);
        assert_eq!(candidate.memory_id, target_id);
        let rows = store.get_by_ids(&[target_id.clone()]).await.unwrap();
        assert_eq!(rows[0].content, "User lives in Bangalore");
        assert_eq!(store.len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn execute_delete_requires_both_sides() {
        let reconciler = reconciler([]);
        let store = InMemoryStore::new();
        let index = FlatIndex::in_memory(2, Metric::Cosine).unwrap();

        let memory = Memory::new(MemorySource::UserMessage, "x", "fact");
        store.insert(&memory).await.unwrap();
        index
            .insert(&memory.memory_id, &[1.0, 0.0], memory.payload())
            .await
            .unwrap();

        let mut scratch = memory.clone();
        let ok = reconciler
            .execute(
                &decision(Operation::Delete, Some(&memory.memory_id)),
                &mut scratch,
                &[1.0, 0.0],
                &store,
                &index,
            )
            .await;

        assert!(ok);
        assert!(store.is_empty());
        assert!(index.is_empty());

        // The vector is already gone: a second delete is one-sided and fails.
        store.insert(&memory).await.unwrap();
        let ok = reconciler
            .execute(
                &decision(Operation::Delete, Some(&memory.memory_id)),
                &mut scratch,
                &[1.0, 0.0],
                &store,
                &index,
            )
            .await;
        assert!(!ok);
    }
}
