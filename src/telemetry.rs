//! Telemetry name constants.
//!
//! Span attribute keys, metric names and fixed attribute values emitted by
//! the instrumentation. Consumers install their own tracer provider and
//! `metrics` recorder; without them every span and metric call is a no-op.
//!
//! Keep these stable; changing them is a breaking change for dashboards.
//!
//! # Attribute key paths
//!
//! Prompts and completions are indexed positionally, zero-based:
//! `llm.prompts.<i>.user`, `llm.completions.<i>.content`.

// ============================================================================
// Span attribute keys
// ============================================================================

pub const LLM_VENDOR: &str = "llm.vendor";
pub const LLM_REQUEST_TYPE: &str = "llm.request.type";
pub const LLM_REQUEST_MODEL: &str = "llm.request.model";
pub const LLM_REQUEST_MAX_TOKENS: &str = "llm.request.max_tokens";
pub const LLM_TEMPERATURE: &str = "llm.temperature";
pub const LLM_TOP_P: &str = "llm.top_p";
pub const LLM_FREQUENCY_PENALTY: &str = "llm.frequency_penalty";
pub const LLM_PRESENCE_PENALTY: &str = "llm.presence_penalty";
pub const LLM_IS_STREAMING: &str = "llm.is_streaming";

/// Namespace of indexed prompt attributes.
pub const LLM_PROMPTS: &str = "llm.prompts";
/// Namespace of indexed completion attributes.
pub const LLM_COMPLETIONS: &str = "llm.completions";

pub const LLM_RESPONSE_MODEL: &str = "llm.response.model";
pub const LLM_USAGE_PROMPT_TOKENS: &str = "llm.usage.prompt_tokens";
pub const LLM_USAGE_COMPLETION_TOKENS: &str = "llm.usage.completion_tokens";
pub const LLM_USAGE_TOTAL_TOKENS: &str = "llm.usage.total_tokens";

// ============================================================================
// Metric dimensions
// ============================================================================

/// Token direction: "prompt" or "completion".
pub const LLM_USAGE_TOKEN_TYPE: &str = "llm.usage.token_type";
pub const LLM_RESPONSE_STOP_REASON: &str = "llm.response.stop_reason";
/// Class name of the error raised by the wrapped call.
pub const ERROR_TYPE: &str = "error.type";

// ============================================================================
// Metric names
// ============================================================================

/// Tokens used in prompts and completions.
///
/// Labels: `llm.response.model`, `llm.usage.token_type`.
pub const COMPLETION_TOKENS: &str = "llm.anthropic.completion.tokens";

/// Choices returned by a completion call.
///
/// Labels: `llm.response.model`, `llm.response.stop_reason`.
pub const COMPLETION_CHOICES: &str = "llm.anthropic.completion.choices";

/// Completion call duration in seconds.
///
/// Labels: `llm.response.model` on success, `error.type` on failure.
pub const COMPLETION_DURATION: &str = "llm.anthropic.completion.duration";

/// Errors raised by completion calls.
///
/// Labels: `error.type`.
pub const COMPLETION_EXCEPTIONS: &str = "llm.anthropic.completion.exceptions";

// ============================================================================
// Fixed values
// ============================================================================

pub const VENDOR_ANTHROPIC: &str = "Anthropic";
pub const REQUEST_TYPE_COMPLETION: &str = "completion";
pub const REQUEST_TYPE_CHAT: &str = "chat";

/// Span name shared by every completion/messages target.
pub const SPAN_ANTHROPIC_COMPLETION: &str = "anthropic.completion";
/// Prefix of chat-framework span names; the model's class name follows.
pub const SPAN_CHAT_TASK_PREFIX: &str = "langchain.task";

/// `llm.prompts.<index>.<field>`
pub fn prompt_key(index: usize, field: &str) -> String {
    format!("{LLM_PROMPTS}.{index}.{field}")
}

/// `llm.completions.<index>.<field>`
pub fn completion_key(index: usize, field: &str) -> String {
    format!("{LLM_COMPLETIONS}.{index}.{field}")
}
