use engram_core::EmbeddingModel;
use engram_core::embedding::Embedding;
use serde::{Deserialize, Serialize};

use crate::client::OpenAi;
use crate::error::OpenAiError;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

async fn embed_texts(client: &OpenAi, inputs: &[&str]) -> Result<Vec<Embedding>, OpenAiError> {
    let config = client.config();
    let request = EmbeddingRequest {
        model: &config.embedding_model,
        input: inputs,
    };
    let response: EmbeddingResponse = client.post_json("/embeddings", &request).await?;
    collect_vectors(response, inputs.len(), config.embedding_dimensions)
}

/// Orders items by their reported index and checks cardinality and dimension.
fn collect_vectors(
    response: EmbeddingResponse,
    expected_count: usize,
    expected_dim: usize,
) -> Result<Vec<Embedding>, OpenAiError> {
    if response.data.len() != expected_count {
        return Err(OpenAiError::MissingData(format!(
            "embedding response has {} items for {} inputs",
            response.data.len(),
            expected_count
        )));
    }

    let mut ordered: Vec<Option<Embedding>> = vec![None; expected_count];
    for item in response.data {
        if item.embedding.len() != expected_dim {
            return Err(OpenAiError::MissingData(format!(
                "embedding has dimension {}, expected {expected_dim}",
                item.embedding.len()
            )));
        }
        let Some(slot) = ordered.get_mut(item.index) else {
            return Err(OpenAiError::MissingData(format!(
                "embedding index {} out of range",
                item.index
            )));
        };
        *slot = Some(item.embedding);
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, vector)| {
            vector.ok_or_else(|| {
                OpenAiError::MissingData(format!("embedding response missing index {index}"))
            })
        })
        .collect()
}

impl EmbeddingModel for OpenAi {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    async fn embed(&self, text: &str) -> engram_core::Result<Embedding> {
        let mut vectors = embed_texts(self, &[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| OpenAiError::MissingData("embedding response is empty".to_owned()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> engram_core::Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        Ok(embed_texts(self, &inputs).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(items: Vec<(usize, Vec<f32>)>) -> EmbeddingResponse {
        EmbeddingResponse {
            data: items
                .into_iter()
                .map(|(index, embedding)| EmbeddingItem { index, embedding })
                .collect(),
        }
    }

    #[test]
    fn vectors_are_reordered_by_index() {
        let vectors = collect_vectors(
            response(vec![(1, vec![0.0, 1.0]), (0, vec![1.0, 0.0])]),
            2,
            2,
        )
        .unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let error = collect_vectors(response(vec![(0, vec![1.0])]), 1, 2).unwrap_err();
        assert!(matches!(error, OpenAiError::MissingData(_)));
    }

    #[test]
    fn wrong_cardinality_is_rejected() {
        let error = collect_vectors(response(vec![(0, vec![1.0, 0.0])]), 2, 2).unwrap_err();
        assert!(matches!(error, OpenAiError::MissingData(_)));
    }

    #[test]
    fn response_json_parses() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-3-small"
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
    }
}
