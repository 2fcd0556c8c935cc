//! Public types for the instrumentation API.

mod chat;
mod message;
mod request;
mod response;

pub use chat::{Generation, LlmResult};
pub use message::{ContentPart, ImageData, ImageSource, Message, MessageContent, Role};
pub use request::CompletionRequest;
pub use response::{
    CompletionResponse, ContentBlock, ContentDelta, DeltaUsage, MessageDelta, ResponseBody,
    StreamEvent, Usage,
};
