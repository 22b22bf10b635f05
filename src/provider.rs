//! Runtime provider selection from the validated configuration.
//!
//! The configuration names exactly one backend per group; these wrappers turn
//! that choice into concrete trait objects without making the service itself
//! dynamic. A group that names a provider whose cargo feature is disabled is
//! a configuration error.

use engram_core::{EmbeddingModel, GenerationConfig, LanguageModel};
use engram_memory::config::{EmbeddingConfig, LlmConfig};
use engram_memory::{
    FlatIndex, MemoryConfig, MemoryError, MemoryService, MetadataBackend, Result,
};

/// The language model selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyLanguageModel {
    /// OpenAI chat completions.
    #[cfg(feature = "openai")]
    OpenAi(engram_openai::OpenAi),
    /// Google Gemini.
    #[cfg(feature = "gemini")]
    Gemini(engram_gemini::Gemini),
}

impl LanguageModel for AnyLanguageModel {
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
        config: Option<&GenerationConfig>,
    ) -> engram_core::Result {
        match self {
            #[cfg(feature = "openai")]
            Self::OpenAi(model) => model.complete(prompt, system, config).await,
            #[cfg(feature = "gemini")]
            Self::Gemini(model) => model.complete(prompt, system, config).await,
        }
    }
}

/// The embedding model selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyEmbeddingModel {
    /// OpenAI embeddings.
    #[cfg(feature = "openai")]
    OpenAi(engram_openai::OpenAi),
    /// Gemini embeddings.
    #[cfg(feature = "gemini")]
    Gemini(engram_gemini::Gemini),
}

impl EmbeddingModel for AnyEmbeddingModel {
    fn dim(&self) -> usize {
        match self {
            #[cfg(feature = "openai")]
            Self::OpenAi(model) => model.dim(),
            #[cfg(feature = "gemini")]
            Self::Gemini(model) => model.dim(),
        }
    }

    async fn embed(&self, text: &str) -> engram_core::Result<Vec<f32>> {
        match self {
            #[cfg(feature = "openai")]
            Self::OpenAi(model) => model.embed(text).await,
            #[cfg(feature = "gemini")]
            Self::Gemini(model) => model.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> engram_core::Result<Vec<Vec<f32>>> {
        match self {
            #[cfg(feature = "openai")]
            Self::OpenAi(model) => model.embed_batch(texts).await,
            #[cfg(feature = "gemini")]
            Self::Gemini(model) => model.embed_batch(texts).await,
        }
    }
}

/// Builds the language model named by the `llm` group.
pub fn language_model(config: &LlmConfig) -> Result<AnyLanguageModel> {
    if let Some(selected) = &config.openai {
        #[cfg(feature = "openai")]
        return Ok(AnyLanguageModel::OpenAi(
            engram_openai::OpenAi::new(selected.api_key.clone())
                .with_model(selected.model.clone()),
        ));
        #[cfg(not(feature = "openai"))]
        {
            let _ = selected;
            return Err(MemoryError::Config(
                "llm config selects openai, but the `openai` feature is disabled".to_owned(),
            ));
        }
    }
    if let Some(selected) = &config.gemini {
        #[cfg(feature = "gemini")]
        return Ok(AnyLanguageModel::Gemini(
            engram_gemini::Gemini::new(selected.api_key.clone())
                .with_model(selected.model.clone()),
        ));
        #[cfg(not(feature = "gemini"))]
        {
            let _ = selected;
            return Err(MemoryError::Config(
                "llm config selects gemini, but the `gemini` feature is disabled".to_owned(),
            ));
        }
    }
    Err(MemoryError::Config("llm config selects no backend".to_owned()))
}

/// Builds the embedding model named by the `embedding` group.
pub fn embedding_model(config: &EmbeddingConfig) -> Result<AnyEmbeddingModel> {
    if let Some(selected) = &config.openai {
        #[cfg(feature = "openai")]
        return Ok(AnyEmbeddingModel::OpenAi(
            engram_openai::OpenAi::new(selected.api_key.clone())
                .with_embedding_model(selected.model.clone())
                .with_embedding_dimensions(selected.dimension),
        ));
        #[cfg(not(feature = "openai"))]
        {
            let _ = selected;
            return Err(MemoryError::Config(
                "embedding config selects openai, but the `openai` feature is disabled".to_owned(),
            ));
        }
    }
    if let Some(selected) = &config.gemini {
        #[cfg(feature = "gemini")]
        return Ok(AnyEmbeddingModel::Gemini(
            engram_gemini::Gemini::new(selected.api_key.clone())
                .with_embedding_model(selected.model.clone())
                .with_embedding_dimensions(selected.dimension),
        ));
        #[cfg(not(feature = "gemini"))]
        {
            let _ = selected;
            return Err(MemoryError::Config(
                "embedding config selects gemini, but the `gemini` feature is disabled".to_owned(),
            ));
        }
    }
    Err(MemoryError::Config(
        "embedding config selects no backend".to_owned(),
    ))
}

/// The service type produced by [`connect`].
pub type ConfiguredService =
    MemoryService<AnyLanguageModel, AnyEmbeddingModel, MetadataBackend, FlatIndex>;

/// Validates the configuration and connects a fully wired service.
pub async fn connect(config: &MemoryConfig) -> Result<ConfiguredService> {
    config.validate()?;

    let llm = language_model(&config.llm)?;
    let embedder = embedding_model(&config.embedding)?;
    let store = MetadataBackend::from_config(&config.storage)?;
    let flat = config
        .vector
        .flat
        .as_ref()
        .ok_or_else(|| MemoryError::Config("vector config selects no backend".to_owned()))?;
    let index = FlatIndex::from_config(flat)?;

    MemoryService::connect_with(llm, embedder, store, index, config.pipeline_options()).await
}
