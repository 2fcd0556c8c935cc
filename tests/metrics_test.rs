//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;

use common::{
    Reply, ScriptedClient, SpanPipeline, SnapshotVec, counter_total, counter_with_label,
    has_histogram, instrumented, instrumented_async,
};
use llm_instrumentation::telemetry;
use llm_instrumentation::{
    AsyncCompletions, ClientError, CompletionRequest, CompletionResponse, Completions, Config,
    ContentBlock, Message, StreamEvent,
};

fn blocks_response() -> CompletionResponse {
    CompletionResponse {
        model: Some("claude-3-sonnet-20240229".into()),
        content: Some(vec![
            ContentBlock::text("first"),
            ContentBlock::text("second"),
        ]),
        stop_reason: Some("end_turn".into()),
        ..CompletionResponse::default()
    }
}

fn request() -> CompletionRequest {
    CompletionRequest::new("claude-3-sonnet-20240229").messages(vec![Message::user("two answers")])
}

fn description(snapshot: &SnapshotVec, name: &str) -> Option<(Option<metrics::Unit>, String)> {
    snapshot
        .iter()
        .find(|(key, _, _, _)| key.key().name() == name)
        .and_then(|(_, unit, desc, _)| desc.as_ref().map(|d| (*unit, d.to_string())))
}

#[test]
fn choices_count_every_content_block() {
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Message(blocks_response())));
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let wrapped = instrumented(&client, &pipeline, Config::default());
        Completions::create(&wrapped, &request()).unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::COMPLETION_CHOICES,
            (telemetry::LLM_RESPONSE_STOP_REASON, "end_turn")
        ),
        2
    );
    // Prompt "two answers" and the first block "first".
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::COMPLETION_TOKENS,
            (telemetry::LLM_USAGE_TOKEN_TYPE, "prompt")
        ),
        2
    );
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::COMPLETION_TOKENS,
            (telemetry::LLM_USAGE_TOKEN_TYPE, "completion")
        ),
        1
    );
}

#[test]
fn instruments_are_described() {
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Message(blocks_response())));
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let wrapped = instrumented(&client, &pipeline, Config::default());
        Completions::create(&wrapped, &request()).unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let (unit, text) = description(&snapshot, telemetry::COMPLETION_DURATION).unwrap();
    assert_eq!(unit, Some(metrics::Unit::Seconds));
    assert_eq!(text, "Duration of chat completion operation");
    let (unit, _) = description(&snapshot, telemetry::COMPLETION_TOKENS).unwrap();
    assert_eq!(unit, Some(metrics::Unit::Count));
}

#[test]
fn disabled_metrics_skip_streams_too() {
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Stream(vec![Ok(
        StreamEvent::Completion {
            completion: " Hi".into(),
            stop_reason: Some("stop_sequence".into()),
            model: Some("claude-2.1".into()),
        },
    )])));
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let wrapped = instrumented(&client, &pipeline, Config::default().metrics_enabled(false));
        let request = CompletionRequest::new("claude-2.1").prompt("Hi").stream(true);
        let events = Completions::create(&wrapped, &request)
            .unwrap()
            .into_stream()
            .unwrap();
        assert_eq!(events.count(), 1);
    });

    assert!(snapshotter.snapshot().into_vec().is_empty());
    assert_eq!(pipeline.spans().len(), 1);
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn async_success_records_duration_and_tokens() {
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Message(blocks_response())));
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let wrapped = instrumented_async(&client, &pipeline, Config::default());
                AsyncCompletions::create(&wrapped, &request()).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert!(has_histogram(&snapshot, telemetry::COMPLETION_DURATION));
    assert_eq!(counter_total(&snapshot, telemetry::COMPLETION_TOKENS), 3);
    assert_eq!(counter_total(&snapshot, telemetry::COMPLETION_CHOICES), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn async_failure_records_exception() {
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Fail(|| ClientError::ApiTimeout)));
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let _result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let wrapped = instrumented_async(&client, &pipeline, Config::default());
                AsyncCompletions::create(&wrapped, &request()).await
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::COMPLETION_EXCEPTIONS,
            (telemetry::ERROR_TYPE, "APITimeoutError")
        ),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::COMPLETION_CHOICES), 0);
}

#[test]
fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let pipeline = SpanPipeline::new();
    let client = Arc::new(ScriptedClient::new(Reply::Message(blocks_response())));
    let wrapped = instrumented(&client, &pipeline, Config::default());
    Completions::create(&wrapped, &request()).unwrap();
}
