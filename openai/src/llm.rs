use engram_core::{GenerationConfig, LanguageModel};
use serde::{Deserialize, Serialize};

use crate::client::OpenAi;
use crate::error::OpenAiError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LanguageModel for OpenAi {
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
        config: Option<&GenerationConfig>,
    ) -> engram_core::Result {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        // top_k has no chat-completions counterpart and is ignored.
        let request = ChatRequest {
            model: &self.config().model,
            messages,
            temperature: config.and_then(|config| config.temperature),
            max_tokens: config.and_then(|config| config.max_tokens),
            top_p: config.and_then(|config| config.top_p),
            stop: config.and_then(|config| config.stop.as_deref()),
        };

        let response: ChatResponse = self.post_json("/chat/completions", &request).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OpenAiError::MissingData("chat response has no content".to_owned()))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_parameters() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: Some(0.0),
            max_tokens: None,
            top_p: None,
            stop: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("top_p").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_content_parses() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "{\"memories\": []}"}}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("{\"memories\": []}")
        );
    }
}
