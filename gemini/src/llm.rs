use engram_core::{GenerationConfig, LanguageModel};

use crate::client::Gemini;
use crate::error::GeminiError;
use crate::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationParameters};

fn generation_parameters(config: &GenerationConfig) -> GenerationParameters {
    GenerationParameters {
        temperature: config.temperature,
        max_output_tokens: config.max_tokens,
        top_p: config.top_p,
        top_k: config.top_k,
        stop_sequences: config.stop.clone(),
    }
}

impl LanguageModel for Gemini {
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
        config: Option<&GenerationConfig>,
    ) -> engram_core::Result {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: system.map(|system| Content::text(None, system)),
            generation_config: config.map(generation_parameters),
        };

        let url = self.model_endpoint(&self.config().model, "generateContent");
        let response: GenerateContentResponse = self.post_json(url, &request).await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GeminiError::MissingData("generate response has no candidate text".to_owned())
            })?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_map_onto_the_wire_names() {
        let config = GenerationConfig::deterministic()
            .with_max_tokens(128)
            .with_top_k(40);
        let parameters = generation_parameters(&config);

        let json = serde_json::to_value(&parameters).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["maxOutputTokens"], 128);
        assert_eq!(json["topK"], 40);
        assert!(json.get("topP").is_none());
        assert!(json.get("stopSequences").is_none());
    }
}
