//! Completion metric recording.
//!
//! Data points go through the `metrics` facade; the consumer's installed
//! recorder decides where they end up. When metrics are disabled no
//! [`CompletionMetrics`] exists and every recording site is skipped.

use metrics::{Label, Unit};

use crate::ClientError;
use crate::config::Config;
use crate::telemetry::{
    COMPLETION_CHOICES, COMPLETION_DURATION, COMPLETION_EXCEPTIONS, COMPLETION_TOKENS, ERROR_TYPE,
    LLM_RESPONSE_MODEL, LLM_RESPONSE_STOP_REASON, LLM_USAGE_TOKEN_TYPE,
};
use crate::types::CompletionResponse;

/// Labels shared by every data point of one call.
///
/// A successful call is labelled with its response model, a failed one with
/// the class name of its error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedAttributes {
    labels: Vec<Label>,
}

impl SharedAttributes {
    pub fn from_response(response: &CompletionResponse) -> Self {
        Self::from_model(response.model.as_deref())
    }

    pub fn from_model(model: Option<&str>) -> Self {
        let labels = model
            .filter(|m| !m.is_empty())
            .map(|m| vec![Label::new(LLM_RESPONSE_MODEL, m.to_owned())])
            .unwrap_or_default();
        Self { labels }
    }

    pub fn from_error(error: &ClientError) -> Self {
        Self {
            labels: vec![Label::new(ERROR_TYPE, error.error_type())],
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn with(&self, key: &'static str, value: String) -> Vec<Label> {
        let mut labels = self.labels.clone();
        labels.push(Label::new(key, value));
        labels
    }
}

/// Handle to the four completion instruments.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionMetrics {
    _private: (),
}

impl CompletionMetrics {
    /// Create the handle and describe the instruments to the recorder.
    pub fn new() -> Self {
        metrics::describe_counter!(
            COMPLETION_TOKENS,
            Unit::Count,
            "Number of tokens used in prompt and completions"
        );
        metrics::describe_counter!(
            COMPLETION_CHOICES,
            Unit::Count,
            "Number of choices returned by chat completions call"
        );
        metrics::describe_histogram!(
            COMPLETION_DURATION,
            Unit::Seconds,
            "Duration of chat completion operation"
        );
        metrics::describe_counter!(
            COMPLETION_EXCEPTIONS,
            Unit::Count,
            "Number of exceptions occurred during chat completions"
        );
        Self { _private: () }
    }

    /// `Some` when the policy enables metrics.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.metrics_enabled.then(Self::new)
    }

    /// Record prompt and completion token counts.
    ///
    /// Negative counts are error sentinels and produce no data point.
    pub fn record_token_usage(&self, prompt: i64, completion: i64, shared: &SharedAttributes) {
        for (token_type, count) in [("prompt", prompt), ("completion", completion)] {
            let Ok(count) = u64::try_from(count) else {
                continue;
            };
            metrics::counter!(
                COMPLETION_TOKENS,
                shared.with(LLM_USAGE_TOKEN_TYPE, token_type.to_owned())
            )
            .increment(count);
        }
    }

    /// Record the number of choices returned. Zero choices record nothing.
    pub fn record_choices(
        &self,
        count: usize,
        stop_reason: Option<&str>,
        shared: &SharedAttributes,
    ) {
        if count == 0 {
            return;
        }
        let labels = match stop_reason {
            Some(reason) => shared.with(LLM_RESPONSE_STOP_REASON, reason.to_owned()),
            None => shared.labels.clone(),
        };
        metrics::counter!(COMPLETION_CHOICES, labels).increment(count as u64);
    }

    /// Record the wall-clock duration of the wrapped call.
    pub fn record_duration(&self, seconds: f64, shared: &SharedAttributes) {
        metrics::histogram!(COMPLETION_DURATION, shared.labels.clone()).record(seconds);
    }

    /// Count one failed call.
    pub fn record_exception(&self, shared: &SharedAttributes) {
        metrics::counter!(COMPLETION_EXCEPTIONS, shared.labels.clone()).increment(1);
    }
}
