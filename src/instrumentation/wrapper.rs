//! Interception wrappers.
//!
//! [`InstrumentedCompletions`] and [`InstrumentedAsyncCompletions`] decorate a
//! completion client with a span per call plus the completion metrics. They
//! implement the trait they wrap, so an instrumented client is a drop-in
//! replacement for the original.
//!
//! The wrapped call always happens exactly once and its outcome reaches the
//! caller unchanged. Telemetry failures are logged and swallowed.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::Status;
use tracing::warn;

use super::attributes::{
    TokenUsage, count_token_usage, count_token_usage_async, input_attributes, response_attributes,
};
use super::context::is_suppressed;
use super::metrics::{CompletionMetrics, SharedAttributes};
use super::span::SpanGuard;
use super::stream::{StreamState, TracedEventStream, TracedEvents};
use crate::ClientError;
use crate::config::Config;
use crate::telemetry::{
    ERROR_TYPE, LLM_REQUEST_TYPE, LLM_VENDOR, REQUEST_TYPE_COMPLETION, VENDOR_ANTHROPIC,
};
use crate::traits::{AsyncCompletions, Completion, Completions, EventIter, EventStream};
use crate::types::{CompletionRequest, CompletionResponse};

// ============================================================================
// Shared interception logic
// ============================================================================

/// What every wrapper of one install shares: tracer, span name, policy and
/// (when enabled) the metric instruments.
#[derive(Clone)]
pub struct Interceptor {
    tracer: Arc<BoxedTracer>,
    span_name: &'static str,
    config: Config,
    metrics: Option<CompletionMetrics>,
}

impl Interceptor {
    pub fn new(tracer: Arc<BoxedTracer>, span_name: &'static str, config: Config) -> Self {
        let metrics = CompletionMetrics::from_config(&config);
        Self {
            tracer,
            span_name,
            config,
            metrics,
        }
    }

    pub fn span_name(&self) -> &'static str {
        self.span_name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn start_span(&self, request: &CompletionRequest) -> SpanGuard {
        let mut span = SpanGuard::start(
            &self.tracer,
            self.span_name,
            vec![
                KeyValue::new(LLM_VENDOR, VENDOR_ANTHROPIC),
                KeyValue::new(LLM_REQUEST_TYPE, REQUEST_TYPE_COMPLETION),
            ],
        );
        if span.is_recording() {
            match input_attributes(request, &self.config) {
                Ok(attrs) => span.set_attributes(attrs),
                Err(e) => warn!(error = %e, "failed to set input attributes for completion span"),
            }
        }
        span
    }

    fn record_duration(&self, seconds: f64, shared: &SharedAttributes) {
        if let Some(metrics) = &self.metrics {
            metrics.record_duration(seconds, shared);
        }
    }

    /// The wrapped call raised: record the failure and close the span.
    fn fail(&self, mut span: SpanGuard, seconds: f64, error: &ClientError) {
        let shared = SharedAttributes::from_error(error);
        if let Some(metrics) = &self.metrics {
            metrics.record_duration(seconds, &shared);
            metrics.record_exception(&shared);
        }
        span.set_attributes([KeyValue::new(ERROR_TYPE, error.error_type())]);
        span.set_status(Status::error(error.to_string()));
        span.end();
    }

    /// Whether a message response is worth resolving token usage for.
    fn wants_usage(&self, span: &SpanGuard) -> bool {
        span.is_recording() || self.metrics.is_some()
    }

    /// The wrapped call returned a message: write it out and close the span.
    fn complete(
        &self,
        mut span: SpanGuard,
        response: &CompletionResponse,
        usage: Option<crate::Result<TokenUsage>>,
        shared: &SharedAttributes,
    ) {
        if span.is_recording() {
            span.set_attributes(response_attributes(response, &self.config));
        }
        match usage {
            Some(Ok(usage)) => {
                span.set_attributes(usage.attributes());
                if let Some(metrics) = &self.metrics {
                    metrics.record_token_usage(usage.prompt_tokens, usage.completion_tokens, shared);
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "failed to set token usage for completion span");
            }
            None => {}
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_choices(
                response.body().choice_count(),
                response.stop_reason.as_deref(),
                shared,
            );
        }
        span.set_status(Status::Ok);
        span.end();
    }

    /// Hand the open span to a stream adapter; duration is recorded when it
    /// finalizes.
    fn stream_state(
        &self,
        span: SpanGuard,
        request: &CompletionRequest,
        elapsed: f64,
    ) -> StreamState {
        StreamState::new(
            span,
            request.clone(),
            self.config.clone(),
            self.metrics,
            elapsed,
        )
    }
}

// ============================================================================
// InstrumentedCompletions
// ============================================================================

/// Decorator that wraps a [`Completions`] client with telemetry.
pub struct InstrumentedCompletions {
    inner: Arc<dyn Completions>,
    interceptor: Interceptor,
}

impl InstrumentedCompletions {
    pub fn new(inner: Arc<dyn Completions>, interceptor: Interceptor) -> Self {
        Self { inner, interceptor }
    }

    /// The client this wrapper delegates to.
    pub fn inner(&self) -> &Arc<dyn Completions> {
        &self.inner
    }
}

impl Completions for InstrumentedCompletions {
    fn create(&self, request: &CompletionRequest) -> Result<Completion<EventIter>, ClientError> {
        if is_suppressed() {
            return self.inner.create(request);
        }

        let span = self.interceptor.start_span(request);
        let start = Instant::now();
        let result = self.inner.create(request);
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Err(e) => {
                self.interceptor.fail(span, elapsed, &e);
                Err(e)
            }
            Ok(Completion::Stream(events)) => {
                let state = self.interceptor.stream_state(span, request, elapsed);
                let traced = TracedEvents::new(events, state, Arc::clone(&self.inner));
                Ok(Completion::Stream(Box::new(traced)))
            }
            Ok(Completion::Message(response)) => {
                let shared = SharedAttributes::from_response(&response);
                self.interceptor.record_duration(elapsed, &shared);
                let usage = if !self.interceptor.wants_usage(&span) {
                    None
                } else if let Some(usage) = response.usage {
                    Some(Ok(TokenUsage::from(usage)))
                } else {
                    Some(count_token_usage(
                        self.inner.as_ref(),
                        request,
                        response.body().primary_text(),
                    ))
                };
                self.interceptor.complete(span, &response, usage, &shared);
                Ok(Completion::Message(response))
            }
        }
    }

    fn count_tokens(&self, text: &str) -> Result<i64, ClientError> {
        self.inner.count_tokens(text)
    }
}

// ============================================================================
// InstrumentedAsyncCompletions
// ============================================================================

/// Decorator that wraps an [`AsyncCompletions`] client with telemetry.
///
/// Same semantics as [`InstrumentedCompletions`]; token counting is awaited.
pub struct InstrumentedAsyncCompletions {
    inner: Arc<dyn AsyncCompletions>,
    interceptor: Interceptor,
}

impl InstrumentedAsyncCompletions {
    pub fn new(inner: Arc<dyn AsyncCompletions>, interceptor: Interceptor) -> Self {
        Self { inner, interceptor }
    }

    /// The client this wrapper delegates to.
    pub fn inner(&self) -> &Arc<dyn AsyncCompletions> {
        &self.inner
    }
}

#[async_trait]
impl AsyncCompletions for InstrumentedAsyncCompletions {
    async fn create(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion<EventStream>, ClientError> {
        if is_suppressed() {
            return self.inner.create(request).await;
        }

        let span = self.interceptor.start_span(request);
        let start = Instant::now();
        let result = self.inner.create(request).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Err(e) => {
                self.interceptor.fail(span, elapsed, &e);
                Err(e)
            }
            Ok(Completion::Stream(events)) => {
                let state = self.interceptor.stream_state(span, request, elapsed);
                let traced = TracedEventStream::new(events, state, Arc::clone(&self.inner));
                Ok(Completion::Stream(Box::pin(traced)))
            }
            Ok(Completion::Message(response)) => {
                let shared = SharedAttributes::from_response(&response);
                self.interceptor.record_duration(elapsed, &shared);
                let usage = if !self.interceptor.wants_usage(&span) {
                    None
                } else if let Some(usage) = response.usage {
                    Some(Ok(TokenUsage::from(usage)))
                } else {
                    Some(
                        count_token_usage_async(
                            self.inner.as_ref(),
                            request,
                            response.body().primary_text(),
                        )
                        .await,
                    )
                };
                self.interceptor.complete(span, &response, usage, &shared);
                Ok(Completion::Message(response))
            }
        }
    }

    async fn count_tokens(&self, text: &str) -> Result<i64, ClientError> {
        self.inner.count_tokens(text).await
    }
}
