//! Chat-framework instrumentation.
//!
//! [`TracedChatModel`] wraps a framework chat model and emits one
//! `langchain.task.<class name>` span per invocation. The span is the current
//! span while the wrapped model runs, so spans opened underneath it (an
//! instrumented completion client, for instance) become its children.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::context::FutureExt;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use tracing::warn;

use super::attributes::dump_content;
use super::context::is_suppressed;
use crate::ClientError;
use crate::config::Config;
use crate::telemetry::{
    LLM_REQUEST_MODEL, LLM_REQUEST_TYPE, LLM_RESPONSE_MODEL, REQUEST_TYPE_CHAT,
    SPAN_CHAT_TASK_PREFIX, completion_key, prompt_key,
};
use crate::traits::{AsyncChatModel, ChatModel};
use crate::types::{LlmResult, Message};

/// Decorator that traces a [`ChatModel`] or [`AsyncChatModel`].
pub struct TracedChatModel<M> {
    inner: M,
    tracer: Arc<BoxedTracer>,
    config: Config,
}

impl<M> TracedChatModel<M> {
    pub fn new(inner: M, tracer: Arc<BoxedTracer>, config: Config) -> Self {
        Self {
            inner,
            tracer,
            config,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    /// Open the task span as a child of the current context and return the
    /// context that carries it.
    fn enter(&self, class_name: &str, model: &str, messages: &[Vec<Message>]) -> Context {
        let span = self
            .tracer
            .start(format!("{SPAN_CHAT_TASK_PREFIX}.{class_name}"));
        let cx = Context::current_with_span(span);
        for kv in request_attributes(model, messages, &self.config) {
            cx.span().set_attribute(kv);
        }
        cx
    }

    fn exit(&self, cx: &Context, result: &Result<LlmResult, ClientError>) {
        let span = cx.span();
        match result {
            Ok(output) => {
                if self.config.send_prompts {
                    for kv in generation_attributes(output) {
                        span.set_attribute(kv);
                    }
                }
            }
            Err(e) => span.set_status(Status::error(e.to_string())),
        }
        span.end();
    }
}

fn request_attributes(model: &str, messages: &[Vec<Message>], config: &Config) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new(LLM_REQUEST_TYPE, REQUEST_TYPE_CHAT),
        KeyValue::new(LLM_REQUEST_MODEL, model.to_owned()),
        KeyValue::new(LLM_RESPONSE_MODEL, model.to_owned()),
    ];
    if !config.send_prompts {
        return attrs;
    }
    for (i, message) in messages.first().into_iter().flatten().enumerate() {
        match dump_content(&message.content) {
            Ok(content) => attrs.push(KeyValue::new(prompt_key(i, "user"), content)),
            Err(e) => warn!(error = %e, index = i, "failed to serialize chat prompt"),
        }
    }
    attrs
}

/// First candidate of every generation list.
fn generation_attributes(output: &LlmResult) -> Vec<KeyValue> {
    output
        .generations
        .iter()
        .enumerate()
        .filter_map(|(i, candidates)| {
            candidates
                .first()
                .map(|g| KeyValue::new(completion_key(i, "content"), g.text.clone()))
        })
        .collect()
}

impl<M: ChatModel> ChatModel for TracedChatModel<M> {
    fn class_name(&self) -> &str {
        self.inner.class_name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn generate(&self, messages: &[Vec<Message>]) -> Result<LlmResult, ClientError> {
        if is_suppressed() {
            return self.inner.generate(messages);
        }

        let cx = self.enter(self.inner.class_name(), self.inner.model(), messages);
        let result = {
            let _guard = cx.clone().attach();
            self.inner.generate(messages)
        };
        self.exit(&cx, &result);
        result
    }
}

#[async_trait]
impl<M: AsyncChatModel> AsyncChatModel for TracedChatModel<M> {
    fn class_name(&self) -> &str {
        self.inner.class_name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn agenerate(&self, messages: &[Vec<Message>]) -> Result<LlmResult, ClientError> {
        if is_suppressed() {
            return self.inner.agenerate(messages).await;
        }

        let cx = self.enter(self.inner.class_name(), self.inner.model(), messages);
        let result = self
            .inner
            .agenerate(messages)
            .with_context(cx.clone())
            .await;
        self.exit(&cx, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentPart, Generation};

    fn value_of(attrs: &[KeyValue], key: &str) -> Option<String> {
        attrs
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.to_string())
    }

    #[test]
    fn prompts_come_from_the_first_batch_only() {
        let batches = vec![
            vec![Message::system("be brief"), Message::user("hi")],
            vec![Message::user("other batch")],
        ];
        let attrs = request_attributes("claude-2", &batches, &Config::default());
        assert_eq!(value_of(&attrs, "llm.prompts.0.user").as_deref(), Some("be brief"));
        assert_eq!(value_of(&attrs, "llm.prompts.1.user").as_deref(), Some("hi"));
        assert!(value_of(&attrs, "llm.prompts.2.user").is_none());
        assert_eq!(value_of(&attrs, LLM_REQUEST_TYPE).as_deref(), Some("chat"));
    }

    #[test]
    fn part_lists_are_serialized() {
        let batches = vec![vec![Message::user(vec![ContentPart::text("look")])]];
        let attrs = request_attributes("m", &batches, &Config::default());
        assert_eq!(
            value_of(&attrs, "llm.prompts.0.user").as_deref(),
            Some(r#"[{"type":"text","text":"look"}]"#)
        );
    }

    #[test]
    fn only_the_first_candidate_is_recorded() {
        let output = LlmResult {
            generations: vec![
                vec![Generation::new("a"), Generation::new("ignored")],
                vec![],
                vec![Generation::new("c")],
            ],
            llm_output: None,
        };
        let attrs = generation_attributes(&output);
        assert_eq!(attrs.len(), 2);
        assert_eq!(value_of(&attrs, "llm.completions.0.content").as_deref(), Some("a"));
        assert_eq!(value_of(&attrs, "llm.completions.2.content").as_deref(), Some("c"));
    }
}
