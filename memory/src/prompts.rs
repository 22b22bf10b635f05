//! Prompt templates for the extraction and reconciliation stages.

use std::fmt::Write;

use crate::extract::ExtractionMode;
use crate::model::Turn;

const COMBINED_EXTRACTION_RULES: &str = "\
You are a memory engine for a long-term AI assistant. Extract ONLY stable, \
long-term facts that should be remembered across conversations.

DO NOT extract:
- transient states (mood, temporary plans, one-time actions)
- pleasantries or conversational fluff
- questions
- assistant suggestions the user did not accept

A memory must be specific, factual, persistent over time, and useful in \
future conversations. Write each memory as a standalone factual statement, \
one fact per memory.

Rules:
- Extract user-related facts (preferences, profile, habits, relationships, \
locations, work, goals) with source \"user_message\".
- Extract assistant-derived facts ONLY when they encode decisions or agreed \
context, with source \"assistant_message\".
- Use source \"conversation\" for facts established jointly by both sides.
- Do NOT infer beyond what is stated.";

const USER_EXTRACTION_RULES: &str = "\
You are a personal information organizer. Extract durable facts, memories, \
and preferences about the USER from the conversation below.

Generate facts solely from the user's messages. Never include information \
that appears only in assistant or system messages.

Remember things like: personal preferences (food, products, activities, \
entertainment), significant personal details (names, relationships, dates), \
plans and intentions, health and wellness constraints, and professional \
details. Skip pleasantries and one-off logistics.

Every extracted memory must use source \"user_message\".";

const AGENT_EXTRACTION_RULES: &str = "\
You are an assistant information organizer. Extract durable facts, \
preferences, and characteristics about the ASSISTANT from the conversation \
below.

Generate facts solely from the assistant's messages. Never include \
information that appears only in user or system messages.

Remember things like: preferences the assistant states, capabilities it \
claims, personality traits it displays, and how it approaches tasks. Skip \
pleasantries.

Every extracted memory must use source \"assistant_message\".";

const EXTRACTION_OUTPUT_CONTRACT: &str = r#"Return the output strictly as valid JSON, with no explanations:

{"memories": [{"source": "user_message", "content": "The user is vegetarian", "type": "dietary_preference"}]}

- "source" is one of "user_message", "assistant_message", "conversation".
- "type" is a short category label such as "preference", "personal_info", "fact", "plan", "professional".
- If nothing qualifies, return {"memories": []}."#;

/// Renders the recent history window the way the extractor sees it.
fn render_turns(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let _ = writeln!(out, "User: {}", turn.user);
        let _ = writeln!(out, "Assistant: {}", turn.assistant);
    }
    out.trim_end().to_owned()
}

/// Builds the single-shot extraction prompt for one exchange.
pub(crate) fn extraction_prompt(
    mode: ExtractionMode,
    recent_turns: &[Turn],
    user_message: &str,
    assistant_message: &str,
) -> String {
    let rules = match mode {
        ExtractionMode::Both => COMBINED_EXTRACTION_RULES,
        ExtractionMode::User => USER_EXTRACTION_RULES,
        ExtractionMode::Agent => AGENT_EXTRACTION_RULES,
    };
    let history = if recent_turns.is_empty() {
        "(no earlier turns)".to_owned()
    } else {
        render_turns(recent_turns)
    };

    format!(
        "{rules}\n\n\
         Recent conversation:\n{history}\n\n\
         Current exchange:\n\
         User: {user_message}\n\
         Assistant: {assistant_message}\n\n\
         TASK: Extract all new long-term memories implied or explicitly stated \
         in the conversation.\n\n\
         {EXTRACTION_OUTPUT_CONTRACT}"
    )
}

/// Builds the batch reconciliation prompt.
///
/// `candidates_json` is the serialized candidates-with-neighbors array
/// (candidate id, candidate memory, existing neighbor payloads).
pub(crate) fn operations_prompt(candidates_json: &str) -> String {
    format!(
        r#"You are a memory management engine for a long-term AI assistant.

Decide what operation should be performed for each candidate memory below.

For each candidate, choose exactly one operation:
- ADD: new distinct fact that does not overlap with any existing memory
- UPDATE: same fact as an existing memory but more specific, recent, or accurate
- DELETE: clearly contradicts an existing memory that should be removed
- NOOP: semantically equivalent to an existing memory, or adds nothing

RULES:
- Prefer UPDATE over ADD when the facts describe the same real-world attribute.
- Prefer NOOP over ADD when the information is redundant.
- Use DELETE only for a clear contradiction.
- If several existing memories match, pick the best target.
- If no existing memory is relevant, use ADD.

---

INPUT DATA:

{candidates_json}

---

REQUIRED OUTPUT FORMAT (JSON only, no explanations):

{{
  "operations": [
    {{
      "candidate_id": "temp_0",
      "operation": "ADD | UPDATE | DELETE | NOOP",
      "target_memory_id": "string or null",
      "confidence": 0.95
    }}
  ]
}}

- Include one operation per candidate.
- target_memory_id is required for UPDATE/DELETE and null for ADD/NOOP.
- confidence is between 0.0 and 1.0.

EXAMPLES:

Candidate: "User lives in Bangalore"; existing: [{{"memory_id": "m2", "content": "User lives in Delhi"}}]
=> {{"candidate_id": "temp_0", "operation": "UPDATE", "target_memory_id": "m2", "confidence": 0.93}}

Candidate: "User follows a vegetarian diet"; existing: [{{"memory_id": "m1", "content": "User is vegetarian"}}]
=> {{"candidate_id": "temp_0", "operation": "NOOP", "target_memory_id": null, "confidence": 0.88}}

Candidate: "User is lactose intolerant"; existing: [{{"memory_id": "m1", "content": "User is vegetarian"}}]
=> {{"candidate_id": "temp_0", "operation": "ADD", "target_memory_id": null, "confidence": 0.91}}

Candidate: "User eats chicken regularly"; existing: [{{"memory_id": "m1", "content": "User is vegetarian"}}]
=> {{"candidate_id": "temp_0", "operation": "DELETE", "target_memory_id": "m1", "confidence": 0.95}}"#
    )
}

/// Strips a leading/trailing fenced code block from a model reply.
///
/// Models regularly wrap JSON in ``` fences despite instructions; the opening
/// fence may carry an info string ("```json").
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    let body = body.trim_end();
    body.strip_suffix("```").map_or(body, str::trim_end)
}
