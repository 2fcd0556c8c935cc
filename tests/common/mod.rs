//! Shared fixtures: an in-memory span pipeline, scripted clients and metric
//! snapshot helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::DebugValue;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

use llm_instrumentation::instrumentation::Interceptor;
use llm_instrumentation::telemetry::SPAN_ANTHROPIC_COMPLETION;
use llm_instrumentation::{
    AsyncCompletions, ClientError, Completion, CompletionRequest, CompletionResponse, Completions,
    Config, EventIter, EventStream, InstrumentedAsyncCompletions, InstrumentedCompletions,
    StreamEvent,
};

// ============================================================================
// Span pipeline
// ============================================================================

/// Tracer wired to an in-memory exporter. Spans are exported when they end.
pub struct SpanPipeline {
    pub exporter: InMemorySpanExporter,
    pub provider: SdkTracerProvider,
}

impl SpanPipeline {
    pub fn new() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        Self { exporter, provider }
    }

    pub fn tracer(&self) -> BoxedTracer {
        BoxedTracer::new(Box::new(self.provider.tracer("test")))
    }

    pub fn interceptor(&self, config: Config) -> Interceptor {
        Interceptor::new(Arc::new(self.tracer()), SPAN_ANTHROPIC_COMPLETION, config)
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter
            .get_finished_spans()
            .expect("in-memory exporter should not fail")
    }

    /// The only finished span.
    pub fn single_span(&self) -> SpanData {
        let mut spans = self.spans();
        assert_eq!(spans.len(), 1, "expected exactly one finished span");
        spans.remove(0)
    }
}

pub fn find_attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn string_attribute(span: &SpanData, key: &str) -> Option<String> {
    find_attribute(span, key).map(|v| v.as_str().into_owned())
}

pub fn int_attribute(span: &SpanData, key: &str) -> Option<i64> {
    match find_attribute(span, key) {
        Some(opentelemetry::Value::I64(v)) => Some(*v),
        _ => None,
    }
}

pub fn has_attribute_prefix(span: &SpanData, prefix: &str) -> bool {
    span.attributes
        .iter()
        .any(|kv| kv.key.as_str().starts_with(prefix))
}

// ============================================================================
// Scripted clients
// ============================================================================

/// What a scripted client answers with.
#[derive(Clone)]
pub enum Reply {
    Message(CompletionResponse),
    Stream(Vec<Result<StreamEvent, String>>),
    Fail(fn() -> ClientError),
}

/// Counts tokens as whitespace-separated words.
pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

pub struct ScriptedClient {
    reply: Reply,
    calls: AtomicU32,
    token_counts: AtomicU32,
    negative_counts: bool,
}

impl ScriptedClient {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicU32::new(0),
            token_counts: AtomicU32::new(0),
            negative_counts: false,
        }
    }

    /// Token counter that answers with the `-1` sentinel.
    pub fn with_negative_counts(mut self) -> Self {
        self.negative_counts = true;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn token_count_calls(&self) -> u32 {
        self.token_counts.load(Ordering::Relaxed)
    }

    fn count(&self, text: &str) -> i64 {
        self.token_counts.fetch_add(1, Ordering::Relaxed);
        if self.negative_counts {
            -1
        } else {
            word_count(text)
        }
    }

    fn events(events: &[Result<StreamEvent, String>]) -> Vec<Result<StreamEvent, ClientError>> {
        events
            .iter()
            .cloned()
            .map(|item| item.map_err(ClientError::ApiConnection))
            .collect()
    }
}

impl Completions for ScriptedClient {
    fn create(&self, _request: &CompletionRequest) -> Result<Completion<EventIter>, ClientError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.reply {
            Reply::Message(response) => Ok(Completion::Message(response.clone())),
            Reply::Stream(events) => Ok(Completion::Stream(Box::new(
                Self::events(events).into_iter(),
            ))),
            Reply::Fail(error) => Err(error()),
        }
    }

    fn count_tokens(&self, text: &str) -> Result<i64, ClientError> {
        Ok(self.count(text))
    }
}

#[async_trait]
impl AsyncCompletions for ScriptedClient {
    async fn create(
        &self,
        _request: &CompletionRequest,
    ) -> Result<Completion<EventStream>, ClientError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.reply {
            Reply::Message(response) => Ok(Completion::Message(response.clone())),
            Reply::Stream(events) => Ok(Completion::Stream(Box::pin(
                futures_util::stream::iter(Self::events(events)),
            ))),
            Reply::Fail(error) => Err(error()),
        }
    }

    async fn count_tokens(&self, text: &str) -> Result<i64, ClientError> {
        tokio::task::yield_now().await;
        Ok(self.count(text))
    }
}

pub fn instrumented(
    client: &Arc<ScriptedClient>,
    pipeline: &SpanPipeline,
    config: Config,
) -> InstrumentedCompletions {
    let inner: Arc<dyn Completions> = client.clone();
    InstrumentedCompletions::new(inner, pipeline.interceptor(config))
}

pub fn instrumented_async(
    client: &Arc<ScriptedClient>,
    pipeline: &SpanPipeline,
    config: Config,
) -> InstrumentedAsyncCompletions {
    let inner: Arc<dyn AsyncCompletions> = client.clone();
    InstrumentedAsyncCompletions::new(inner, pipeline.interceptor(config))
}

// ============================================================================
// Metric snapshots
// ============================================================================

pub type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
pub fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values of a metric whose labels include `label`.
pub fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: (&str, &str)) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
pub fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Every recorded entry of `name` carries `label`.
pub fn all_labelled(snapshot: &SnapshotVec, name: &str, label: (&str, &str)) -> bool {
    let mut entries = snapshot
        .iter()
        .filter(|(key, _, _, _)| key.key().name() == name)
        .peekable();
    entries.peek().is_some()
        && entries.all(|(key, _, _, _)| {
            key.key()
                .labels()
                .any(|l| l.key() == label.0 && l.value() == label.1)
        })
}
