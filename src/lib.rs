//! llm-instrumentation - OpenTelemetry spans and usage metrics for LLM clients
//!
//! This crate decorates an LLM client's completion methods so that every call
//! produces one client span (request parameters, prompts, completions, token
//! usage) and, optionally, usage metrics. The instrumented client behaves
//! exactly like the original: same results, same errors, same streams.
//!
//! Spans go to whatever OpenTelemetry tracer provider the application
//! installs; metrics go through the `metrics` facade to the installed
//! recorder. Without either, instrumentation costs almost nothing.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use llm_instrumentation::{
//!     ClientError, Completion, CompletionRequest, CompletionResponse, Completions, Config,
//!     EventIter, Instrumentor, MethodRegistry, WRAPPED_METHODS,
//! };
//!
//! struct EchoClient;
//!
//! impl Completions for EchoClient {
//!     fn create(&self, request: &CompletionRequest) -> Result<Completion<EventIter>, ClientError> {
//!         Ok(Completion::Message(CompletionResponse {
//!             completion: request.prompt.clone(),
//!             ..Default::default()
//!         }))
//!     }
//!
//!     fn count_tokens(&self, text: &str) -> Result<i64, ClientError> {
//!         Ok(text.split_whitespace().count() as i64)
//!     }
//! }
//!
//! let registry = MethodRegistry::new();
//! let path = WRAPPED_METHODS[0].path;
//! registry.register(path, Arc::new(EchoClient));
//!
//! let instrumentor = Instrumentor::builder().config(Config::from_env()).build();
//! instrumentor.install(&registry);
//!
//! let client = registry.get(&path).unwrap();
//! let request = CompletionRequest::new("claude-instant-1.2").prompt("Hello there");
//! let response = client.create(&request)?.into_message().unwrap();
//! assert_eq!(response.completion.as_deref(), Some("Hello there"));
//! # Ok::<(), ClientError>(())
//! ```

pub mod config;
pub mod error;
pub mod instrumentation;
pub mod instrumentor;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use config::Config;
pub use error::{ClientError, InstrumentationError, Result};
pub use instrumentor::{
    Instrumentor, InstrumentorBuilder, MethodPath, MethodRegistry, WRAPPED_AMETHODS,
    WRAPPED_METHODS, WrappedMethod,
};
pub use traits::{
    AsyncChatModel, AsyncCompletions, ChatModel, Completion, Completions, EventIter, EventStream,
};

#[cfg(feature = "chat")]
pub use instrumentation::TracedChatModel;
pub use instrumentation::{
    InstrumentedAsyncCompletions, InstrumentedCompletions, suppress_instrumentation,
};

// Re-export all types
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, ContentDelta, ContentPart, DeltaUsage,
    Generation, ImageData, ImageSource, LlmResult, Message, MessageContent, MessageDelta,
    ResponseBody, Role, StreamEvent, Usage,
};
