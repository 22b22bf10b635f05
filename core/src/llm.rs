//! Language model completion trait.
//!
//! The memory pipeline drives its language model through a deliberately
//! narrow interface: one user prompt, an optional system instruction, and
//! optional sampling parameters, returning the model's text verbatim. There
//! is no streaming, no tool calling, and no structured-output negotiation —
//! callers that expect JSON parse the returned text themselves and own the
//! retry policy for malformed replies.

use alloc::{string::String, vec::Vec};
use core::future::Future;

/// Sampling parameters forwarded to the provider.
///
/// Every field is optional; `None` means "use the provider default". The
/// reconciliation stage of the pipeline pins `temperature` to `0.0` for
/// deterministic decisions, while extraction runs on provider defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    /// Sampling temperature, typically in `0.0..=2.0`.
    pub temperature: Option<f32>,
    /// Hard cap on generated tokens.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold in `0.0..=1.0`.
    pub top_p: Option<f32>,
    /// Top-k sampling parameter.
    pub top_k: Option<u32>,
    /// Sequences that stop generation.
    pub stop: Option<Vec<String>>,
}

impl GenerationConfig {
    /// A configuration with every knob left at the provider default.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            stop: None,
        }
    }

    /// A deterministic configuration (`temperature = 0.0`).
    #[must_use]
    pub const fn deterministic() -> Self {
        let mut config = Self::new();
        config.temperature = Some(0.0);
        config
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the generated-token cap.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the nucleus sampling threshold.
    #[must_use]
    pub const fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the top-k sampling parameter.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Sets the stop sequences.
    #[must_use]
    pub fn with_stop(mut self, stop: impl Into<Vec<String>>) -> Self {
        self.stop = Some(stop.into());
        self
    }
}

/// Completes a single prompt into text.
///
/// Implementations map the arguments onto their provider's chat or
/// generate-content endpoint and return the reply text unmodified. Transport
/// and quota failures surface as errors; the caller decides whether to retry.
///
/// # Example
///
/// ```rust
/// use engram_core::{GenerationConfig, LanguageModel};
///
/// struct Parrot;
///
/// impl LanguageModel for Parrot {
///     async fn complete(
///         &self,
///         prompt: &str,
///         _system: Option<&str>,
///         _config: Option<&GenerationConfig>,
///     ) -> engram_core::Result {
///         Ok(prompt.into())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let reply = Parrot.complete("echo", None, None).await.unwrap();
/// assert_eq!(reply, "echo");
/// # });
/// ```
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` (optionally under `system`) and returns the reply text.
    fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
        config: Option<&GenerationConfig>,
    ) -> impl Future<Output = crate::Result> + Send;
}
