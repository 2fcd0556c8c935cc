//! Streaming response adapters.
//!
//! A streamed call returns before any content exists, so its span stays open
//! until the consumer has drained the events. [`TracedEvents`] (iterator) and
//! [`TracedEventStream`] (async stream) pass every event through unchanged,
//! accumulate the completion text, and finalize the span once: at exhaustion
//! with token usage, or on drop with whatever was seen so far.
//!
//! The call duration is measured when the wrapped call returns but only
//! recorded at finalization, once the response model is known, so it carries
//! the same labels as the token counts of that call.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use futures_util::future::BoxFuture;
use opentelemetry::KeyValue;
use opentelemetry::trace::Status;
use tracing::{debug, warn};

use super::attributes::{TokenUsage, count_token_usage, count_token_usage_async};
use super::metrics::{CompletionMetrics, SharedAttributes};
use super::span::SpanGuard;
use crate::ClientError;
use crate::config::Config;
use crate::telemetry::{LLM_RESPONSE_MODEL, completion_key};
use crate::traits::{AsyncCompletions, Completions};
use crate::types::{CompletionRequest, StreamEvent};

/// Per-stream telemetry state shared by both adapters.
pub(crate) struct StreamState {
    span: SpanGuard,
    request: CompletionRequest,
    config: Config,
    metrics: Option<CompletionMetrics>,
    elapsed: f64,
    text: String,
    stop_reason: Option<String>,
    model: Option<String>,
    finished: bool,
}

impl StreamState {
    pub(crate) fn new(
        span: SpanGuard,
        request: CompletionRequest,
        config: Config,
        metrics: Option<CompletionMetrics>,
        elapsed: f64,
    ) -> Self {
        Self {
            span,
            request,
            config,
            metrics,
            elapsed,
            text: String::new(),
            stop_reason: None,
            model: None,
            finished: false,
        }
    }

    fn observe(&mut self, event: &StreamEvent) {
        if let Some(delta) = event.text_delta() {
            self.text.push_str(delta);
        }
        if let Some(reason) = event.stop_reason() {
            self.stop_reason = Some(reason.to_owned());
        }
        if let Some(model) = event.model().filter(|m| !m.is_empty()) {
            self.model = Some(model.to_owned());
        }
    }

    /// Whether exhaustion should pay for token counting.
    fn needs_usage(&self) -> bool {
        !self.finished && (self.span.is_recording() || self.metrics.is_some())
    }

    /// Write the accumulated response, record usage and end the span.
    ///
    /// `usage` is `None` when the stream was not drained.
    fn finish(&mut self, usage: Option<crate::Result<TokenUsage>>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut attrs = Vec::new();
        if let Some(model) = self.model.as_deref() {
            attrs.push(KeyValue::new(LLM_RESPONSE_MODEL, model.to_owned()));
        }
        if let Some(reason) = self.stop_reason.as_deref() {
            attrs.push(KeyValue::new(completion_key(0, "finish_reason"), reason.to_owned()));
        }
        if self.config.send_prompts && !self.text.is_empty() {
            attrs.push(KeyValue::new(completion_key(0, "content"), self.text.clone()));
        }

        let shared = SharedAttributes::from_model(self.model.as_deref());
        if let Some(metrics) = &self.metrics {
            metrics.record_duration(self.elapsed, &shared);
        }
        match usage {
            Some(Ok(usage)) => {
                attrs.extend(usage.attributes());
                if let Some(metrics) = &self.metrics {
                    metrics.record_token_usage(usage.prompt_tokens, usage.completion_tokens, &shared);
                }
            }
            Some(Err(e)) => warn!(error = %e, "failed to count tokens for streamed completion"),
            None => {}
        }

        self.span.set_attributes(attrs);
        self.span.set_status(Status::Ok);
        self.span.end();
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                buffered = self.text.len(),
                "completion stream dropped before exhaustion"
            );
            self.finish(None);
        }
    }
}

// ============================================================================
// Sync
// ============================================================================

/// Instrumented iterator over stream events.
pub struct TracedEvents<I> {
    inner: I,
    state: StreamState,
    client: Arc<dyn Completions>,
    exhausted: bool,
}

impl<I> TracedEvents<I> {
    pub(crate) fn new(inner: I, state: StreamState, client: Arc<dyn Completions>) -> Self {
        Self {
            inner,
            state,
            client,
            exhausted: false,
        }
    }

    /// Completion text accumulated so far.
    pub fn text(&self) -> &str {
        &self.state.text
    }
}

impl<I> Iterator for TracedEvents<I>
where
    I: Iterator<Item = Result<StreamEvent, ClientError>>,
{
    type Item = Result<StreamEvent, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.inner.next() {
            Some(item) => {
                if let Ok(event) = &item {
                    self.state.observe(event);
                }
                Some(item)
            }
            None => {
                self.exhausted = true;
                let usage = self.state.needs_usage().then(|| {
                    count_token_usage(
                        self.client.as_ref(),
                        &self.state.request,
                        Some(&self.state.text),
                    )
                });
                self.state.finish(usage);
                None
            }
        }
    }
}

// ============================================================================
// Async
// ============================================================================

pin_project_lite::pin_project! {
    /// Instrumented stream of stream events.
    ///
    /// At exhaustion the adapter awaits token counting before it reports
    /// the end of the stream.
    pub struct TracedEventStream<S> {
        #[pin]
        inner: S,
        state: StreamState,
        client: Arc<dyn AsyncCompletions>,
        counting: Option<BoxFuture<'static, crate::Result<TokenUsage>>>,
        exhausted: bool,
    }
}

impl<S> TracedEventStream<S> {
    pub(crate) fn new(inner: S, state: StreamState, client: Arc<dyn AsyncCompletions>) -> Self {
        Self {
            inner,
            state,
            client,
            counting: None,
            exhausted: false,
        }
    }

    /// Completion text accumulated so far.
    pub fn text(&self) -> &str {
        &self.state.text
    }
}

impl<S> Stream for TracedEventStream<S>
where
    S: Stream<Item = Result<StreamEvent, ClientError>>,
{
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if !*this.exhausted {
            match ready!(this.inner.poll_next(cx)) {
                Some(item) => {
                    if let Ok(event) = &item {
                        this.state.observe(event);
                    }
                    return Poll::Ready(Some(item));
                }
                None => {
                    *this.exhausted = true;
                    if this.state.needs_usage() {
                        let client = Arc::clone(this.client);
                        let request = this.state.request.clone();
                        let text = this.state.text.clone();
                        *this.counting = Some(Box::pin(async move {
                            count_token_usage_async(client.as_ref(), &request, Some(&text)).await
                        }));
                    }
                }
            }
        }

        if let Some(counting) = this.counting.as_mut() {
            let usage = ready!(counting.as_mut().poll(cx));
            *this.counting = None;
            this.state.finish(Some(usage));
        }
        this.state.finish(None);
        Poll::Ready(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentDelta;

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentDelta::TextDelta { text: text.into() },
        }
    }

    #[test]
    fn observe_accumulates_text_and_metadata() {
        let tracer = opentelemetry::global::tracer("test");
        let span = SpanGuard::start(&tracer, "test", Vec::new());
        let mut state =
            StreamState::new(span, CompletionRequest::default(), Config::default(), None, 0.0);

        state.observe(&delta("Hel"));
        state.observe(&StreamEvent::Ping);
        state.observe(&delta("lo"));
        state.observe(&StreamEvent::Completion {
            completion: "!".into(),
            stop_reason: Some("stop_sequence".into()),
            model: Some("claude-2.1".into()),
        });

        assert_eq!(state.text, "Hello!");
        assert_eq!(state.stop_reason.as_deref(), Some("stop_sequence"));
        assert_eq!(state.model.as_deref(), Some("claude-2.1"));
    }

    #[test]
    fn finish_runs_once() {
        let tracer = opentelemetry::global::tracer("test");
        let span = SpanGuard::start(&tracer, "test", Vec::new());
        let mut state =
            StreamState::new(span, CompletionRequest::default(), Config::default(), None, 0.0);

        state.finish(None);
        assert!(state.finished);
        assert!(!state.needs_usage());
        state.finish(Some(Ok(TokenUsage::new(1, 1))));
    }
}
