//! Nested service configuration.
//!
//! The configuration tree mirrors the service's collaborators: one choice
//! under each of `llm`, `embedding`, `storage`, and `vector`, plus a global
//! `debug` flag and retry knobs. Validation rejects a group with zero or more
//! than one choice before anything is constructed.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MemoryError, Result};
use crate::extract::ExtractionMode;
use crate::index::Metric;

fn default_max_retries() -> usize {
    3
}

/// Tunables for the write pipeline, independent of provider choice.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Which side(s) of the conversation the extractor reads.
    pub extraction_mode: ExtractionMode,
    /// Attempt budget for the extraction and reconciliation calls.
    pub max_retries: usize,
    /// Fixed sleep between attempts, absorbing transient rate limits.
    pub retry_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            extraction_mode: ExtractionMode::default(),
            max_retries: default_max_retries(),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// OpenAI language model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiLlmConfig {
    /// API key.
    pub api_key: String,
    /// Chat model id, e.g. `gpt-4o-mini`.
    pub model: String,
}

/// Gemini language model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiLlmConfig {
    /// API key.
    pub api_key: String,
    /// Model id, e.g. `gemini-2.0-flash`.
    pub model: String,
}

/// The `llm` group: exactly one provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    /// OpenAI chat completions.
    #[serde(default)]
    pub openai: Option<OpenAiLlmConfig>,
    /// Google Gemini.
    #[serde(default)]
    pub gemini: Option<GeminiLlmConfig>,
}

impl LlmConfig {
    fn validate(&self) -> Result<()> {
        exactly_one("llm", &[self.openai.is_some(), self.gemini.is_some()])
    }
}

/// OpenAI embedding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiEmbeddingConfig {
    /// API key.
    pub api_key: String,
    /// Embedding model id.
    #[serde(default = "OpenAiEmbeddingConfig::default_model")]
    pub model: String,
    /// Vector dimension produced by the model.
    pub dimension: usize,
}

impl OpenAiEmbeddingConfig {
    fn default_model() -> String {
        "text-embedding-3-small".to_owned()
    }
}

/// Gemini embedding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiEmbeddingConfig {
    /// API key.
    pub api_key: String,
    /// Embedding model id.
    #[serde(default = "GeminiEmbeddingConfig::default_model")]
    pub model: String,
    /// Vector dimension produced by the model.
    pub dimension: usize,
}

impl GeminiEmbeddingConfig {
    fn default_model() -> String {
        "text-embedding-004".to_owned()
    }
}

/// The `embedding` group: exactly one provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI embeddings.
    #[serde(default)]
    pub openai: Option<OpenAiEmbeddingConfig>,
    /// Gemini embeddings.
    #[serde(default)]
    pub gemini: Option<GeminiEmbeddingConfig>,
}

impl EmbeddingConfig {
    fn validate(&self) -> Result<()> {
        exactly_one(
            "embedding",
            &[self.openai.is_some(), self.gemini.is_some()],
        )
    }

    /// The dimension of the selected provider, if the group is valid.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.openai
            .as_ref()
            .map(|config| config.dimension)
            .or_else(|| self.gemini.as_ref().map(|config| config.dimension))
    }
}

/// Marker for the ephemeral in-process metadata store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InMemoryStorageConfig {}

/// Embedded metadata store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RedbStorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

/// The `storage` group: exactly one metadata backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Ephemeral in-process rows.
    #[serde(default)]
    pub memory: Option<InMemoryStorageConfig>,
    /// Embedded durable rows.
    #[serde(default)]
    pub redb: Option<RedbStorageConfig>,
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        exactly_one("storage", &[self.memory.is_some(), self.redb.is_some()])
    }
}

/// Flat vector index settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FlatVectorConfig {
    /// Vector dimension; must match the embedding provider's.
    pub dimension: usize,
    /// Persistence location; `None` keeps the index in memory.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Similarity metric.
    #[serde(default)]
    pub metric: Metric,
}

/// The `vector` group: exactly one index backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VectorConfig {
    /// Exact flat index.
    #[serde(default)]
    pub flat: Option<FlatVectorConfig>,
}

impl VectorConfig {
    fn validate(&self) -> Result<()> {
        exactly_one("vector", &[self.flat.is_some()])
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Language model selection.
    pub llm: LlmConfig,
    /// Embedding provider selection.
    pub embedding: EmbeddingConfig,
    /// Metadata store selection.
    pub storage: StorageConfig,
    /// Vector index selection.
    pub vector: VectorConfig,
    /// Enables verbose pipeline logging.
    #[serde(default)]
    pub debug: bool,
    /// Attempt budget for the extraction and reconciliation calls.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl MemoryConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|error| MemoryError::Config(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the one-choice-per-group rule and cross-group consistency.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        self.embedding.validate()?;
        self.storage.validate()?;
        self.vector.validate()?;

        if let (Some(embedding_dim), Some(flat)) =
            (self.embedding.dimension(), self.vector.flat.as_ref())
        {
            if embedding_dim != flat.dimension {
                return Err(MemoryError::Config(format!(
                    "embedding dimension {embedding_dim} does not match vector index dimension {}",
                    flat.dimension
                )));
            }
        }
        Ok(())
    }

    /// The pipeline tunables carried by this configuration.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_retries: self.max_retries,
            ..PipelineOptions::default()
        }
    }
}

fn exactly_one(group: &str, choices: &[bool]) -> Result<()> {
    match choices.iter().filter(|selected| **selected).count() {
        1 => Ok(()),
        0 => Err(MemoryError::Config(format!(
            "{group} config must select exactly one backend (none given)"
        ))),
        count => Err(MemoryError::Config(format!(
            "{group} config must select exactly one backend ({count} given)"
        ))),
    }
}
