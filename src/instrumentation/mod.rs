//! Client instrumentation: attribute extraction, metric recording, stream
//! adapters and the interception wrappers built on them.

pub mod attributes;
#[cfg(feature = "chat")]
pub mod chat;
pub mod context;
pub mod metrics;
mod span;
pub mod stream;
pub mod wrapper;

pub use attributes::{TokenUsage, count_token_usage, count_token_usage_async, dump_content};
#[cfg(feature = "chat")]
pub use chat::TracedChatModel;
pub use context::{SuppressInstrumentation, is_suppressed, suppress_instrumentation};
pub use self::metrics::{CompletionMetrics, SharedAttributes};
pub use stream::{TracedEventStream, TracedEvents};
pub use wrapper::{InstrumentedAsyncCompletions, InstrumentedCompletions, Interceptor};
