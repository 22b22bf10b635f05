use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::OpenAiError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimensions: usize,
    pub(crate) base_url: String,
    pub(crate) organization: Option<String>,
    pub(crate) timeout: Duration,
}

/// OpenAI API client.
///
/// Cheap to clone; the underlying HTTP connection pool is shared.
#[derive(Debug, Clone)]
pub struct OpenAi {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl OpenAi {
    /// Creates a client with default model and endpoint settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: Arc::new(Config {
                api_key: api_key.into(),
                model: DEFAULT_MODEL.to_owned(),
                embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
                embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
                base_url: DEFAULT_BASE_URL.to_owned(),
                organization: None,
                timeout: DEFAULT_TIMEOUT,
            }),
            http: reqwest::Client::new(),
        }
    }

    /// Sets the chat model id.
    #[must_use]
    pub fn with_model(self, model: impl Into<String>) -> Self {
        self.map_config(|config| config.model = model.into())
    }

    /// Sets the embedding model id.
    #[must_use]
    pub fn with_embedding_model(self, model: impl Into<String>) -> Self {
        self.map_config(|config| config.embedding_model = model.into())
    }

    /// Sets the embedding vector dimension the model is expected to return.
    #[must_use]
    pub fn with_embedding_dimensions(self, dimensions: usize) -> Self {
        self.map_config(|config| config.embedding_dimensions = dimensions)
    }

    /// Sets the API base URL (for compatible gateways).
    #[must_use]
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        self.map_config(|config| config.base_url = base_url.into())
    }

    /// Sets the organization header.
    #[must_use]
    pub fn with_organization(self, organization: impl Into<String>) -> Self {
        self.map_config(|config| config.organization = Some(organization.into()))
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.map_config(|config| config.timeout = timeout)
    }

    fn map_config(mut self, apply: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config {
            api_key: self.config.api_key.clone(),
            model: self.config.model.clone(),
            embedding_model: self.config.embedding_model.clone(),
            embedding_dimensions: self.config.embedding_dimensions,
            base_url: self.config.base_url.clone(),
            organization: self.config.organization.clone(),
            timeout: self.config.timeout,
        };
        apply(&mut config);
        self.config = Arc::new(config);
        self
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, OpenAiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        debug!(%url, "openai request");

        let mut request = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(body);
        if let Some(organization) = &self.config.organization {
            request = request.header("OpenAI-Organization", organization);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let client = OpenAi::new("sk-test")
            .with_model("gpt-4o")
            .with_embedding_model("text-embedding-3-large")
            .with_embedding_dimensions(3072)
            .with_base_url("https://proxy.example/v1")
            .with_organization("org-1")
            .with_timeout(Duration::from_secs(5));

        let config = client.config();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.embedding_dimensions, 3072);
        assert_eq!(config.base_url, "https://proxy.example/v1");
        assert_eq!(config.organization.as_deref(), Some("org-1"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
