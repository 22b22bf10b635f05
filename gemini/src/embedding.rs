use engram_core::EmbeddingModel;
use engram_core::embedding::Embedding;

use crate::client::Gemini;
use crate::error::GeminiError;
use crate::types::{
    BatchEmbedContentsRequest, BatchEmbedContentsResponse, BatchEmbedEntry, Content,
    EmbedContentRequest, EmbedContentResponse,
};

fn check_dimension(values: &[f32], expected: usize) -> Result<(), GeminiError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(GeminiError::MissingData(format!(
            "embedding has dimension {}, expected {expected}",
            values.len()
        )))
    }
}

impl EmbeddingModel for Gemini {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    async fn embed(&self, text: &str) -> engram_core::Result<Embedding> {
        let config = self.config();
        let request = EmbedContentRequest {
            content: Content::text(None, text),
        };
        let url = self.model_endpoint(&config.embedding_model, "embedContent");
        let response: EmbedContentResponse = self.post_json(url, &request).await?;

        check_dimension(&response.embedding.values, config.embedding_dimensions)?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> engram_core::Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let config = self.config();
        let qualified_model = format!("models/{}", config.embedding_model);
        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| BatchEmbedEntry {
                    model: qualified_model.clone(),
                    content: Content::text(None, text),
                })
                .collect(),
        };

        let url = self.model_endpoint(&config.embedding_model, "batchEmbedContents");
        let response: BatchEmbedContentsResponse = self.post_json(url, &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(GeminiError::MissingData(format!(
                "batch embedding returned {} vectors for {} inputs",
                response.embeddings.len(),
                texts.len()
            ))
            .into());
        }
        let mut vectors = Vec::with_capacity(response.embeddings.len());
        for embedding in response.embeddings {
            check_dimension(&embedding.values, config.embedding_dimensions)?;
            vectors.push(embedding.values);
        }
        Ok(vectors)
    }
}
