//! Attribute extraction.
//!
//! Pure functions from request/response descriptors to flat span attribute
//! sets, plus token usage resolution. Nothing here touches a span; the
//! wrappers decide where the attributes go and log any error returned.
//!
//! Request values that are absent or falsy (`None`, empty string, zero,
//! `false`) are never written.

use opentelemetry::KeyValue;
use serde::Serialize;

use crate::config::Config;
use crate::telemetry::{
    LLM_FREQUENCY_PENALTY, LLM_IS_STREAMING, LLM_PRESENCE_PENALTY, LLM_REQUEST_MAX_TOKENS,
    LLM_REQUEST_MODEL, LLM_RESPONSE_MODEL, LLM_TEMPERATURE, LLM_TOP_P, LLM_USAGE_COMPLETION_TOKENS,
    LLM_USAGE_PROMPT_TOKENS, LLM_USAGE_TOTAL_TOKENS, completion_key, prompt_key,
};
use crate::traits::{AsyncCompletions, Completions};
use crate::types::{
    CompletionRequest, CompletionResponse, ContentPart, MessageContent, ResponseBody, Usage,
};
use crate::{InstrumentationError, Result};

// ============================================================================
// Request
// ============================================================================

/// Attributes describing the request: parameters and, when enabled, prompts.
pub fn input_attributes(request: &CompletionRequest, config: &Config) -> Result<Vec<KeyValue>> {
    let mut attrs = Vec::new();
    push_str(&mut attrs, LLM_REQUEST_MODEL, request.model.as_deref());
    push_count(
        &mut attrs,
        LLM_REQUEST_MAX_TOKENS,
        request
            .max_tokens_to_sample
            .filter(|&n| n != 0)
            .or(request.max_tokens),
    );
    push_float(&mut attrs, LLM_TEMPERATURE, request.temperature);
    push_float(&mut attrs, LLM_TOP_P, request.top_p);
    push_float(&mut attrs, LLM_FREQUENCY_PENALTY, request.frequency_penalty);
    push_float(&mut attrs, LLM_PRESENCE_PENALTY, request.presence_penalty);
    if request.stream == Some(true) {
        attrs.push(KeyValue::new(LLM_IS_STREAMING, true));
    }

    if config.send_prompts {
        if let Some(prompt) = request.prompt.as_deref() {
            push_str(&mut attrs, prompt_key(0, "user"), Some(prompt));
        } else if let Some(messages) = request.messages.as_deref() {
            for (i, message) in messages.iter().enumerate() {
                let content = dump_content(&message.content)?;
                push_str(&mut attrs, prompt_key(i, "user"), Some(&content));
            }
        }
    }
    Ok(attrs)
}

/// Stable string form of message content.
///
/// Flat text is returned as-is. Part lists become a JSON array of
/// `{"type":"text","text":..}` and
/// `{"type":"image","source":{"type":..,"media_type":..,"data":..}}`
/// objects, with image data rendered through its display form.
pub fn dump_content(content: &MessageContent) -> Result<String> {
    #[derive(Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum Part<'a> {
        Text { text: &'a str },
        Image { source: Source<'a> },
    }

    #[derive(Serialize)]
    struct Source<'a> {
        #[serde(rename = "type")]
        kind: &'a str,
        media_type: &'a str,
        data: String,
    }

    let parts = match content {
        MessageContent::Text(text) => return Ok(text.clone()),
        MessageContent::Parts(parts) => parts,
    };
    let dumped: Vec<Part<'_>> = parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => Part::Text { text },
            ContentPart::Image { source } => Part::Image {
                source: Source {
                    kind: &source.kind,
                    media_type: &source.media_type,
                    data: source.data.to_string(),
                },
            },
        })
        .collect();
    Ok(serde_json::to_string(&dumped)?)
}

// ============================================================================
// Response
// ============================================================================

/// Attributes describing the response: model and, when enabled, completions.
///
/// Token usage is resolved separately, see [`TokenUsage`].
pub fn response_attributes(response: &CompletionResponse, config: &Config) -> Vec<KeyValue> {
    let mut attrs = Vec::new();
    push_str(&mut attrs, LLM_RESPONSE_MODEL, response.model.as_deref());
    if config.send_prompts {
        attrs.extend(completion_attributes(response));
    }
    attrs
}

/// Finish reason and completion text(s), indexed per content block.
pub fn completion_attributes(response: &CompletionResponse) -> Vec<KeyValue> {
    let mut attrs = Vec::new();
    push_str(
        &mut attrs,
        completion_key(0, "finish_reason"),
        response.stop_reason.as_deref(),
    );
    match response.body() {
        ResponseBody::Text(text) => push_str(&mut attrs, completion_key(0, "content"), Some(text)),
        ResponseBody::Blocks(blocks) => {
            for (i, block) in blocks.iter().enumerate() {
                push_str(&mut attrs, completion_key(i, "content"), block.text.as_deref());
            }
        }
        ResponseBody::Empty => {}
    }
    attrs
}

// ============================================================================
// Token usage
// ============================================================================

/// Prompt and completion token figures of one call.
///
/// Counts come either from the API's `usage` block or from the client's
/// token counter. A counter may answer with a negative sentinel; such
/// figures are kept on the span but never become metric data points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Always `prompt_tokens + completion_tokens`.
    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    pub fn attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(LLM_USAGE_PROMPT_TOKENS, self.prompt_tokens),
            KeyValue::new(LLM_USAGE_COMPLETION_TOKENS, self.completion_tokens),
            KeyValue::new(LLM_USAGE_TOTAL_TOKENS, self.total_tokens()),
        ]
    }
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self::new(
            i64::try_from(usage.input_tokens).unwrap_or(i64::MAX),
            i64::try_from(usage.output_tokens).unwrap_or(i64::MAX),
        )
    }
}

/// Count usage with the client's token counter.
///
/// Prompt tokens cover the flat prompt or every message; completion tokens
/// cover `completion`, when given and non-empty.
pub fn count_token_usage(
    client: &dyn Completions,
    request: &CompletionRequest,
    completion: Option<&str>,
) -> Result<TokenUsage> {
    let count = |text: &str| {
        client
            .count_tokens(text)
            .map_err(InstrumentationError::TokenCount)
    };
    let mut prompt_tokens = 0;
    for text in request.prompt_texts() {
        prompt_tokens = add_counts(prompt_tokens, count(&text)?);
    }
    let completion_tokens = match completion.filter(|text| !text.is_empty()) {
        Some(text) => count(text)?,
        None => 0,
    };
    Ok(TokenUsage::new(prompt_tokens, completion_tokens))
}

/// Asynchronous twin of [`count_token_usage`].
pub async fn count_token_usage_async(
    client: &dyn AsyncCompletions,
    request: &CompletionRequest,
    completion: Option<&str>,
) -> Result<TokenUsage> {
    let mut prompt_tokens = 0;
    for text in request.prompt_texts() {
        let counted = client
            .count_tokens(&text)
            .await
            .map_err(InstrumentationError::TokenCount)?;
        prompt_tokens = add_counts(prompt_tokens, counted);
    }
    let completion_tokens = match completion.filter(|text| !text.is_empty()) {
        Some(text) => client
            .count_tokens(text)
            .await
            .map_err(InstrumentationError::TokenCount)?,
        None => 0,
    };
    Ok(TokenUsage::new(prompt_tokens, completion_tokens))
}

// A negative sentinel poisons the whole sum.
fn add_counts(total: i64, count: i64) -> i64 {
    if total < 0 || count < 0 {
        -1
    } else {
        total.saturating_add(count)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn push_str(attrs: &mut Vec<KeyValue>, key: impl Into<opentelemetry::Key>, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        attrs.push(KeyValue::new(key, value.to_string()));
    }
}

fn push_float(attrs: &mut Vec<KeyValue>, key: &'static str, value: Option<f64>) {
    if let Some(value) = value.filter(|v| *v != 0.0) {
        attrs.push(KeyValue::new(key, value));
    }
}

fn push_count(attrs: &mut Vec<KeyValue>, key: &'static str, value: Option<u64>) {
    if let Some(value) = value.filter(|v| *v != 0) {
        attrs.push(KeyValue::new(key, i64::try_from(value).unwrap_or(i64::MAX)));
    }
}
