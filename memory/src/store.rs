//! Metadata stores: durable row-per-memory CRUD.
//!
//! [`MetadataStore`] is the interface the pipeline writes rows through; the
//! vector index holds the searchable copy and this store holds the
//! authoritative one. Two products ship here: [`InMemoryStore`] for tests and
//! prototyping, and [`RedbStore`] on an embedded key-value database. Remote
//! backends (document or relational) plug in by implementing the same trait.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::future::Future;
use std::path::PathBuf;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{MemoryError, Result};
use crate::model::Memory;

/// Durable row-per-memory storage.
pub trait MetadataStore: Send + Sync {
    /// Idempotently creates the row structure.
    fn ensure_schema(&self) -> impl Future<Output = Result<()>> + Send;

    /// Inserts a row. A duplicate `memory_id` is an error.
    fn insert(&self, memory: &Memory) -> impl Future<Output = Result<()>> + Send;

    /// Replaces the row whose id matches `memory.memory_id`.
    fn update(&self, memory: &Memory) -> impl Future<Output = Result<()>> + Send;

    /// Removes a row. Returns `true` if a row existed; a missing row is not
    /// an error.
    fn delete(&self, memory_id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Fetches the rows for the given ids. Missing ids are skipped,
    /// duplicates collapsed; order is unspecified.
    fn get_by_ids(&self, memory_ids: &[String]) -> impl Future<Output = Result<Vec<Memory>>> + Send;

    /// Removes every row scoped to `user_id`; returns the count removed.
    fn delete_all_for_user(&self, user_id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// True iff a trivial round-trip succeeds.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}

/// A simple in-memory store for testing and prototyping. Not persistent.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<String, Memory>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for InMemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, memory: &Memory) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&memory.memory_id) {
            return Err(MemoryError::Duplicate(memory.memory_id.clone()));
        }
        rows.insert(memory.memory_id.clone(), memory.clone());
        Ok(())
    }

    async fn update(&self, memory: &Memory) -> Result<()> {
        let mut rows = self.rows.write();
        let Some(row) = rows.get_mut(&memory.memory_id) else {
            return Err(MemoryError::NotFound(memory.memory_id.clone()));
        };
        *row = memory.clone();
        Ok(())
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        Ok(self.rows.write().remove(memory_id).is_some())
    }

    async fn get_by_ids(&self, memory_ids: &[String]) -> Result<Vec<Memory>> {
        let unique: BTreeSet<&String> = memory_ids.iter().collect();
        let rows = self.rows.read();
        Ok(unique.into_iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, memory| memory.user_id.as_deref() != Some(user_id));
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }
}

const MEMORIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memories");

/// Embedded durable metadata store using redb.
///
/// Rows are JSON-encoded under their `memory_id`. The single table plays the
/// role of the row structure that `ensure_schema` guarantees; scoped scans
/// (`delete_all_for_user`) walk the table.
pub struct RedbStore {
    path: PathBuf,
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Creates or opens a redb-backed store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MemoryError::Persistence {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db =
            Database::create(&path).map_err(|error| MemoryError::Store(error.to_string()))?;
        debug!(path = %path.display(), "opened metadata store");
        Ok(Self { path, db })
    }

    fn encode(memory: &Memory) -> Result<Vec<u8>> {
        serde_json::to_vec(memory).map_err(|error| MemoryError::Serialization(error.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Memory> {
        serde_json::from_slice(bytes).map_err(|error| MemoryError::Serialization(error.to_string()))
    }
}

impl MetadataStore for RedbStore {
    async fn ensure_schema(&self) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        txn.open_table(MEMORIES_TABLE)
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        txn.commit()
            .map_err(|error| MemoryError::Store(error.to_string()))
    }

    async fn insert(&self, memory: &Memory) -> Result<()> {
        let encoded = Self::encode(memory)?;
        let txn = self
            .db
            .begin_write()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        {
            let mut table = txn
                .open_table(MEMORIES_TABLE)
                .map_err(|error| MemoryError::Store(error.to_string()))?;
            let exists = table
                .get(memory.memory_id.as_str())
                .map_err(|error| MemoryError::Store(error.to_string()))?
                .is_some();
            if exists {
                return Err(MemoryError::Duplicate(memory.memory_id.clone()));
            }
            table
                .insert(memory.memory_id.as_str(), encoded.as_slice())
                .map_err(|error| MemoryError::Store(error.to_string()))?;
        }
        txn.commit()
            .map_err(|error| MemoryError::Store(error.to_string()))
    }

    async fn update(&self, memory: &Memory) -> Result<()> {
        let encoded = Self::encode(memory)?;
        let txn = self
            .db
            .begin_write()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        {
            let mut table = txn
                .open_table(MEMORIES_TABLE)
                .map_err(|error| MemoryError::Store(error.to_string()))?;
            let exists = table
                .get(memory.memory_id.as_str())
                .map_err(|error| MemoryError::Store(error.to_string()))?
                .is_some();
            if !exists {
                return Err(MemoryError::NotFound(memory.memory_id.clone()));
            }
            table
                .insert(memory.memory_id.as_str(), encoded.as_slice())
                .map_err(|error| MemoryError::Store(error.to_string()))?;
        }
        txn.commit()
            .map_err(|error| MemoryError::Store(error.to_string()))
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        let txn = self
            .db
            .begin_write()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        let removed;
        {
            let mut table = txn
                .open_table(MEMORIES_TABLE)
                .map_err(|error| MemoryError::Store(error.to_string()))?;
            removed = table
                .remove(memory_id)
                .map_err(|error| MemoryError::Store(error.to_string()))?
                .is_some();
        }
        txn.commit()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        Ok(removed)
    }

    async fn get_by_ids(&self, memory_ids: &[String]) -> Result<Vec<Memory>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        let table = match txn.open_table(MEMORIES_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(error) => return Err(MemoryError::Store(error.to_string())),
        };

        let unique: BTreeSet<&String> = memory_ids.iter().collect();
        let mut memories = Vec::new();
        for id in unique {
            let Some(guard) = table
                .get(id.as_str())
                .map_err(|error| MemoryError::Store(error.to_string()))?
            else {
                continue;
            };
            memories.push(Self::decode(guard.value())?);
        }
        Ok(memories)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let txn = self
            .db
            .begin_write()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        let mut removed = 0u64;
        {
            let mut table = txn
                .open_table(MEMORIES_TABLE)
                .map_err(|error| MemoryError::Store(error.to_string()))?;

            let mut scoped = Vec::new();
            for entry in table
                .iter()
                .map_err(|error| MemoryError::Store(error.to_string()))?
            {
                let (key, value) = entry.map_err(|error| MemoryError::Store(error.to_string()))?;
                let memory = Self::decode(value.value())?;
                if memory.user_id.as_deref() == Some(user_id) {
                    scoped.push(key.value().to_owned());
                }
            }

            for id in &scoped {
                table
                    .remove(id.as_str())
                    .map_err(|error| MemoryError::Store(error.to_string()))?;
                removed += 1;
            }
        }
        txn.commit()
            .map_err(|error| MemoryError::Store(error.to_string()))?;
        Ok(removed)
    }

    async fn ping(&self) -> bool {
        self.db.begin_read().is_ok()
    }
}

/// The metadata backend selected by configuration.
#[derive(Debug)]
pub enum MetadataBackend {
    /// Ephemeral in-process rows.
    InMemory(InMemoryStore),
    /// Embedded durable rows.
    Redb(RedbStore),
}

impl MetadataBackend {
    /// Builds the backend named by the (already validated) storage section.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        if let Some(redb) = &config.redb {
            return Ok(Self::Redb(RedbStore::new(&redb.path)?));
        }
        if config.memory.is_some() {
            return Ok(Self::InMemory(InMemoryStore::new()));
        }
        Err(MemoryError::Config(
            "storage config selects no backend".to_owned(),
        ))
    }
}

impl MetadataStore for MetadataBackend {
    async fn ensure_schema(&self) -> Result<()> {
        match self {
            Self::InMemory(store) => store.ensure_schema().await,
            Self::Redb(store) => store.ensure_schema().await,
        }
    }

    async fn insert(&self, memory: &Memory) -> Result<()> {
        match self {
            Self::InMemory(store) => store.insert(memory).await,
            Self::Redb(store) => store.insert(memory).await,
        }
    }

    async fn update(&self, memory: &Memory) -> Result<()> {
        match self {
            Self::InMemory(store) => store.update(memory).await,
            Self::Redb(store) => store.update(memory).await,
        }
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        match self {
            Self::InMemory(store) => store.delete(memory_id).await,
            Self::Redb(store) => store.delete(memory_id).await,
        }
    }

    async fn get_by_ids(&self, memory_ids: &[String]) -> Result<Vec<Memory>> {
        match self {
            Self::InMemory(store) => store.get_by_ids(memory_ids).await,
            Self::Redb(store) => store.get_by_ids(memory_ids).await,
        }
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        match self {
            Self::InMemory(store) => store.delete_all_for_user(user_id).await,
            Self::Redb(store) => store.delete_all_for_user(user_id).await,
        }
    }

    async fn ping(&self) -> bool {
        match self {
            Self::InMemory(store) => store.ping().await,
            Self::Redb(store) => store.ping().await,
        }
    }
}
