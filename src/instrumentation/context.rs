//! Ambient suppression flag.
//!
//! Code that calls an instrumented client on behalf of another
//! instrumentation (or that simply wants no telemetry for a call) marks the
//! current OpenTelemetry context. Every wrapper checks the mark on entry and
//! turns into a plain passthrough when it is present.

use opentelemetry::{Context, ContextGuard};

/// Context value that disables instrumentation for the calls it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressInstrumentation;

/// Whether the current context suppresses instrumentation.
pub fn is_suppressed() -> bool {
    Context::current().get::<SuppressInstrumentation>().is_some()
}

/// Suppress instrumentation until the returned guard is dropped.
///
/// ```rust
/// use llm_instrumentation::instrumentation::{is_suppressed, suppress_instrumentation};
///
/// {
///     let _guard = suppress_instrumentation();
///     assert!(is_suppressed());
/// }
/// assert!(!is_suppressed());
/// ```
pub fn suppress_instrumentation() -> ContextGuard {
    Context::current_with_value(SuppressInstrumentation).attach()
}
