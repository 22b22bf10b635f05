use thiserror::Error;

/// Errors surfaced by the OpenAI client.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        message: String,
    },

    /// Structurally valid response missing the expected data.
    #[error("unexpected response: {0}")]
    MissingData(String),
}
