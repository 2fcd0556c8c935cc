//! Exactly-once span ownership.

use std::borrow::Cow;

use opentelemetry::global::{BoxedSpan, BoxedTracer};
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};

/// Owns a started span and ends it exactly once.
///
/// Finalization paths call [`end`](Self::end) explicitly; dropping an
/// un-ended guard ends the span as well, so a span never outlives its call.
pub(crate) struct SpanGuard {
    span: Option<BoxedSpan>,
}

impl SpanGuard {
    /// Start a client span as a child of the current context.
    pub(crate) fn start(
        tracer: &BoxedTracer,
        name: impl Into<Cow<'static, str>>,
        attributes: Vec<KeyValue>,
    ) -> Self {
        let span = tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(tracer, &Context::current());
        Self { span: Some(span) }
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.span.as_ref().is_some_and(|span| span.is_recording())
    }

    pub(crate) fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        if let Some(span) = self.span.as_mut() {
            span.set_attributes(attributes);
        }
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        if let Some(span) = self.span.as_mut() {
            span.set_status(status);
        }
    }

    /// End the span. Later calls do nothing.
    pub(crate) fn end(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.end();
    }
}
