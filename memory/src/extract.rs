//! Extraction stage: turn one conversation exchange into candidate memories.

use std::time::Duration;

use async_io::Timer;
use engram_core::LanguageModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MemoryError, Result};
use crate::model::{Memory, MemorySource, Turn};
use crate::prompts;

/// Which side(s) of the conversation to extract facts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// User- and assistant-derived facts (assistant facts only when they
    /// encode decisions or agreed context).
    #[default]
    Both,
    /// User-derived facts only.
    User,
    /// Assistant-derived facts only.
    Agent,
}

/// One item of the extractor's JSON reply.
#[derive(Debug, Deserialize)]
struct CandidateFact {
    source: MemorySource,
    content: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    memories: Vec<CandidateFact>,
}

/// Extracts candidate memories from a conversation exchange (one model call
/// per attempt), validating the reply and retrying on malformed output.
#[derive(Debug, Clone)]
pub struct Extractor<L> {
    llm: L,
    mode: ExtractionMode,
    max_retries: usize,
    retry_delay: Duration,
}

impl<L: LanguageModel> Extractor<L> {
    /// Creates an extractor with the default mode and retry policy.
    #[must_use]
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            mode: ExtractionMode::default(),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Selects which side(s) of the conversation to extract from.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the attempt budget (minimum 1).
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = if max_retries == 0 { 1 } else { max_retries };
        self
    }

    /// Sets the fixed sleep between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Extracts candidate memories from the current exchange.
    ///
    /// Candidates come back with fresh ids and timestamps and no user scope;
    /// the service stamps `user_id` afterwards. An empty list is a valid
    /// outcome.
    pub async fn extract(
        &self,
        recent_turns: &[Turn],
        user_message: &str,
        assistant_message: &str,
    ) -> Result<Vec<Memory>> {
        let prompt =
            prompts::extraction_prompt(self.mode, recent_turns, user_message, assistant_message);

        let mut last_reason = String::new();
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                debug!(attempt, max = self.max_retries, "retrying extraction");
                Timer::after(self.retry_delay).await;
            }

            let reply = match self.llm.complete(&prompt, None, None).await {
                Ok(reply) => reply,
                Err(error) => {
                    warn!(%error, attempt, "extraction model call failed");
                    if attempt == self.max_retries {
                        return Err(MemoryError::Llm(error));
                    }
                    last_reason = error.to_string();
                    continue;
                }
            };

            match parse_candidates(&reply) {
                Ok(memories) => {
                    debug!(count = memories.len(), "extraction succeeded");
                    return Ok(memories);
                }
                Err(reason) => {
                    warn!(%reason, attempt, "extraction reply failed validation");
                    last_reason = reason;
                }
            }
        }

        Err(MemoryError::Extraction {
            attempts: self.max_retries,
            reason: last_reason,
        })
    }
}

/// Parses and validates one extraction reply.
fn parse_candidates(raw: &str) -> core::result::Result<Vec<Memory>, String> {
    let cleaned = prompts::strip_code_fences(raw);
    let reply: ExtractionReply =
        serde_json::from_str(cleaned).map_err(|error| error.to_string())?;

    let mut memories = Vec::with_capacity(reply.memories.len());
    for (index, fact) in reply.memories.into_iter().enumerate() {
        if fact.content.trim().is_empty() {
            return Err(format!("memory at index {index} has empty content"));
        }
        memories.push(Memory::new(fact.source, fact.content, fact.kind));
    }
    Ok(memories)
}
