//! Response and streaming event types

use serde::{Deserialize, Serialize};

/// Non-streaming completion or message response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Aggregate text of the text-completions API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
    /// Content blocks of the messages API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The completion payload of a response, resolved once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseBody<'a> {
    /// A single free-text completion.
    Text(&'a str),
    /// An ordered list of content blocks.
    Blocks(&'a [ContentBlock]),
    Empty,
}

impl CompletionResponse {
    /// Resolve which completion shape this response carries.
    ///
    /// Non-empty aggregate text wins over a non-empty block list.
    pub fn body(&self) -> ResponseBody<'_> {
        if let Some(text) = self.completion.as_deref().filter(|t| !t.is_empty()) {
            return ResponseBody::Text(text);
        }
        match self.content.as_deref() {
            Some(blocks) if !blocks.is_empty() => ResponseBody::Blocks(blocks),
            _ => ResponseBody::Empty,
        }
    }
}

impl ResponseBody<'_> {
    /// Number of completion choices carried by the body.
    pub fn choice_count(&self) -> usize {
        match self {
            ResponseBody::Text(_) => 1,
            ResponseBody::Blocks(blocks) => blocks.len(),
            ResponseBody::Empty => 0,
        }
    }

    /// Text that token counting applies to: the aggregate text or the first block.
    pub fn primary_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Blocks(blocks) => blocks.first().and_then(|b| b.text.as_deref()),
            ResponseBody::Empty => None,
        }
    }
}

/// A typed content block of a message response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block type, e.g. "text" or "tool_use".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Token usage reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Incremental events of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text-completions chunk.
    Completion {
        completion: String,
        #[serde(default)]
        stop_reason: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    MessageStart {
        message: CompletionResponse,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
}

/// Payload of a `content_block_delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

/// Payload of a `message_delta` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

/// Cumulative output usage carried by `message_delta`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaUsage {
    pub output_tokens: u64,
}

impl StreamEvent {
    /// Text appended to the completion by this event, if any.
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::Completion { completion, .. } => Some(completion),
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => Some(text),
            _ => None,
        }
    }

    /// Stop reason announced by this event, if any.
    pub fn stop_reason(&self) -> Option<&str> {
        match self {
            StreamEvent::Completion { stop_reason, .. } => stop_reason.as_deref(),
            StreamEvent::MessageDelta { delta, .. } => delta.stop_reason.as_deref(),
            _ => None,
        }
    }

    /// Response model announced by this event, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            StreamEvent::Completion { model, .. } => model.as_deref(),
            StreamEvent::MessageStart { message } => message.model.as_deref(),
            _ => None,
        }
    }
}
