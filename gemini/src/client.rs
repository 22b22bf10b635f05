use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::GeminiError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimensions: usize,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

/// Google Gemini API client.
///
/// Cheap to clone; the underlying HTTP connection pool is shared.
#[derive(Debug, Clone)]
pub struct Gemini {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl Gemini {
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
                timeout: DEFAULT_TIMEOUT,
            }),
            http: reqwest::Client::new(),
        }
    }

    /// Sets the generation model id.
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

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        self.map_config(|config| config.base_url = base_url.into())
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
            timeout: self.config.timeout,
        };
        apply(&mut config);
        self.config = Arc::new(config);
        self
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Composes `{base}/models/{model}:{action}`.
    pub(crate) fn model_endpoint(&self, model: &str, action: &str) -> String {
        format!(
            "{}/models/{model}:{action}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub(crate) async fn post_json<T, B>(&self, url: String, body: &B) -> Result<T, GeminiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        debug!(%url, "gemini request");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }
}
