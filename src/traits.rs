//! Collaborator contracts
//!
//! These are the client surfaces the instrumentation wraps. The LLM client
//! library implements them; the instrumentation implements them again as
//! decorators, so an instrumented client is a drop-in replacement.

use async_trait::async_trait;
use futures_util::Stream;
use std::fmt;
use std::pin::Pin;

use crate::ClientError;
use crate::types::{CompletionRequest, CompletionResponse, LlmResult, Message, StreamEvent};

/// Lazy sequence of stream events, synchronous flavour.
pub type EventIter = Box<dyn Iterator<Item = Result<StreamEvent, ClientError>> + Send>;

/// Lazy sequence of stream events, asynchronous flavour.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Outcome of a completion call: an aggregate response or a stream.
pub enum Completion<S> {
    Message(CompletionResponse),
    Stream(S),
}

impl<S> Completion<S> {
    pub fn is_stream(&self) -> bool {
        matches!(self, Completion::Stream(_))
    }

    /// The aggregate response, if this is not a stream.
    pub fn into_message(self) -> Option<CompletionResponse> {
        match self {
            Completion::Message(message) => Some(message),
            Completion::Stream(_) => None,
        }
    }

    /// The event stream, if this is a stream.
    pub fn into_stream(self) -> Option<S> {
        match self {
            Completion::Message(_) => None,
            Completion::Stream(stream) => Some(stream),
        }
    }
}

impl<S> fmt::Debug for Completion<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Synchronous completion surface (`Completions.create`, `Messages.create`,
/// `Messages.stream`).
pub trait Completions: Send + Sync {
    /// Issue the call.
    fn create(&self, request: &CompletionRequest) -> Result<Completion<EventIter>, ClientError>;

    /// Count tokens in `text` with the client's tokenizer.
    ///
    /// A negative count signals that counting is unavailable.
    fn count_tokens(&self, text: &str) -> Result<i64, ClientError>;
}

/// Asynchronous completion surface (`AsyncCompletions.create`, ...).
#[async_trait]
pub trait AsyncCompletions: Send + Sync {
    /// Issue the call.
    async fn create(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion<EventStream>, ClientError>;

    /// Count tokens in `text` with the client's tokenizer.
    ///
    /// A negative count signals that counting is unavailable.
    async fn count_tokens(&self, text: &str) -> Result<i64, ClientError>;
}

/// Synchronous chat model of a chat-orchestration framework.
pub trait ChatModel: Send + Sync {
    /// Runtime class name of the model, e.g. "ChatAnthropic".
    fn class_name(&self) -> &str;

    /// Model identifier the chat model is configured with.
    fn model(&self) -> &str;

    /// Run one chat invocation over a batch of conversations.
    fn generate(&self, messages: &[Vec<Message>]) -> Result<LlmResult, ClientError>;
}

/// Asynchronous chat model of a chat-orchestration framework.
#[async_trait]
pub trait AsyncChatModel: Send + Sync {
    /// Runtime class name of the model, e.g. "ChatAnthropic".
    fn class_name(&self) -> &str;

    /// Model identifier the chat model is configured with.
    fn model(&self) -> &str;

    /// Run one chat invocation over a batch of conversations.
    async fn agenerate(&self, messages: &[Vec<Message>]) -> Result<LlmResult, ClientError>;
}
