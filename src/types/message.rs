//! Message types for completion and chat requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Role of a message participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message content: a flat string or an ordered list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Get the content when it is a flat string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    /// Concatenated text of every text part (or the flat string).
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// One typed part of a multi-part message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(
        kind: impl Into<String>,
        media_type: impl Into<String>,
        data: impl Into<ImageData>,
    ) -> Self {
        ContentPart::Image {
            source: ImageSource {
                kind: kind.into(),
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

/// Where an image part's bytes come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Source type, e.g. "base64".
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: ImageData,
}

/// Reference to image data.
///
/// The `Display` form is what telemetry records: encoded payloads and paths
/// print as-is, raw bytes print as a length only.
///
/// On the wire a string is always an encoded payload; `Path` is only built
/// in code and never deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageData {
    Encoded(String),
    Bytes(Vec<u8>),
    #[serde(skip_deserializing)]
    Path(PathBuf),
}

impl fmt::Display for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageData::Encoded(s) => f.write_str(s),
            ImageData::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            ImageData::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for ImageData {
    fn from(data: &str) -> Self {
        ImageData::Encoded(data.to_string())
    }
}

impl From<String> for ImageData {
    fn from(data: String) -> Self {
        ImageData::Encoded(data)
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        ImageData::Bytes(bytes)
    }
}

impl From<PathBuf> for ImageData {
    fn from(path: PathBuf) -> Self {
        ImageData::Path(path)
    }
}

/// A conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
