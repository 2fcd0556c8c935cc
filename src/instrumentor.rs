//! Install and uninstall lifecycle.
//!
//! A client library exposes its interceptable methods through a
//! [`MethodRegistry`]. [`Instrumentor::install`] swaps every known target for
//! an instrumented wrapper and keeps the original; [`Instrumentor::uninstall`]
//! puts the originals back.
//!
//! ```rust
//! use llm_instrumentation::{Config, Instrumentor, MethodRegistry};
//!
//! let registry = MethodRegistry::new();
//! let instrumentor = Instrumentor::builder().config(Config::default()).build();
//! instrumentor.install(&registry);
//! assert!(instrumentor.is_installed());
//! instrumentor.uninstall(&registry);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use opentelemetry::global::{self, BoxedTracer};
use tracing::debug;

use crate::config::Config;
use crate::instrumentation::{InstrumentedAsyncCompletions, InstrumentedCompletions, Interceptor};
use crate::telemetry::SPAN_ANTHROPIC_COMPLETION;
use crate::traits::{AsyncCompletions, Completions};
use crate::version;

// ============================================================================
// Targets
// ============================================================================

/// Location of an interceptable client method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodPath {
    pub module: &'static str,
    pub object: &'static str,
    pub method: &'static str,
}

impl MethodPath {
    pub const fn new(module: &'static str, object: &'static str, method: &'static str) -> Self {
        Self {
            module,
            object,
            method,
        }
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.module, self.object, self.method)
    }
}

/// An install target and the span name its calls are recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedMethod {
    pub path: MethodPath,
    pub span_name: &'static str,
}

const COMPLETIONS_MODULE: &str = "anthropic.resources.completions";
const MESSAGES_MODULE: &str = "anthropic.resources.messages";

/// Synchronous install targets.
pub const WRAPPED_METHODS: [WrappedMethod; 3] = [
    WrappedMethod {
        path: MethodPath::new(COMPLETIONS_MODULE, "Completions", "create"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
    WrappedMethod {
        path: MethodPath::new(MESSAGES_MODULE, "Messages", "create"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
    WrappedMethod {
        path: MethodPath::new(MESSAGES_MODULE, "Messages", "stream"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
];

/// Asynchronous install targets.
pub const WRAPPED_AMETHODS: [WrappedMethod; 3] = [
    WrappedMethod {
        path: MethodPath::new(COMPLETIONS_MODULE, "AsyncCompletions", "create"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
    WrappedMethod {
        path: MethodPath::new(MESSAGES_MODULE, "AsyncMessages", "create"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
    WrappedMethod {
        path: MethodPath::new(MESSAGES_MODULE, "AsyncMessages", "stream"),
        span_name: SPAN_ANTHROPIC_COMPLETION,
    },
];

// ============================================================================
// MethodRegistry
// ============================================================================

/// Registry of client method implementations, keyed by [`MethodPath`].
///
/// Callers resolve a method through the registry on every call, so replacing
/// an entry changes behaviour for everyone holding the registry.
#[derive(Default)]
pub struct MethodRegistry {
    sync: RwLock<HashMap<MethodPath, Arc<dyn Completions>>>,
    asynchronous: RwLock<HashMap<MethodPath, Arc<dyn AsyncCompletions>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous implementation.
    pub fn register(&self, path: MethodPath, target: Arc<dyn Completions>) {
        self.replace(path, target);
    }

    /// Register an asynchronous implementation.
    pub fn register_async(&self, path: MethodPath, target: Arc<dyn AsyncCompletions>) {
        self.replace_async(path, target);
    }

    pub fn get(&self, path: &MethodPath) -> Option<Arc<dyn Completions>> {
        let map = self.sync.read().unwrap_or_else(PoisonError::into_inner);
        map.get(path).cloned()
    }

    pub fn get_async(&self, path: &MethodPath) -> Option<Arc<dyn AsyncCompletions>> {
        let map = self
            .asynchronous
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(path).cloned()
    }

    /// Swap in `target`, returning the previous implementation.
    pub fn replace(
        &self,
        path: MethodPath,
        target: Arc<dyn Completions>,
    ) -> Option<Arc<dyn Completions>> {
        let mut map = self.sync.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(path, target)
    }

    /// Swap in `target`, returning the previous implementation.
    pub fn replace_async(
        &self,
        path: MethodPath,
        target: Arc<dyn AsyncCompletions>,
    ) -> Option<Arc<dyn AsyncCompletions>> {
        let mut map = self
            .asynchronous
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(path, target)
    }
}

// ============================================================================
// Instrumentor
// ============================================================================

enum Original {
    Sync(MethodPath, Arc<dyn Completions>),
    Async(MethodPath, Arc<dyn AsyncCompletions>),
}

/// Installs completion instrumentation into a [`MethodRegistry`].
pub struct Instrumentor {
    tracer: Arc<BoxedTracer>,
    config: Config,
    // `Some` while installed.
    originals: Mutex<Option<Vec<Original>>>,
}

impl Instrumentor {
    /// Create a new builder for configuring the instrumentor.
    pub fn builder() -> InstrumentorBuilder {
        InstrumentorBuilder::new()
    }

    /// Instrumentor with the global tracer and the environment policy.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_installed(&self) -> bool {
        self.originals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Wrap every registered target. Targets the registry does not know are
    /// skipped. Installing twice is a no-op.
    pub fn install(&self, registry: &MethodRegistry) {
        let mut originals = self.originals.lock().unwrap_or_else(PoisonError::into_inner);
        if originals.is_some() {
            debug!("completion instrumentation already installed");
            return;
        }

        let mut kept = Vec::new();
        for target in &WRAPPED_METHODS {
            let Some(original) = registry.get(&target.path) else {
                debug!(method = %target.path, "method not found, skipping");
                continue;
            };
            let wrapper = InstrumentedCompletions::new(Arc::clone(&original), self.interceptor(target));
            registry.replace(target.path, Arc::new(wrapper));
            kept.push(Original::Sync(target.path, original));
        }
        for target in &WRAPPED_AMETHODS {
            let Some(original) = registry.get_async(&target.path) else {
                debug!(method = %target.path, "method not found, skipping");
                continue;
            };
            let wrapper =
                InstrumentedAsyncCompletions::new(Arc::clone(&original), self.interceptor(target));
            registry.replace_async(target.path, Arc::new(wrapper));
            kept.push(Original::Async(target.path, original));
        }

        debug!(wrapped = kept.len(), "completion instrumentation installed");
        *originals = Some(kept);
    }

    /// Restore every original replaced by [`install`](Self::install).
    pub fn uninstall(&self, registry: &MethodRegistry) {
        let Some(kept) = self
            .originals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        for original in kept {
            match original {
                Original::Sync(path, target) => {
                    registry.replace(path, target);
                }
                Original::Async(path, target) => {
                    registry.replace_async(path, target);
                }
            }
        }
    }

    /// Trace a chat-framework model with this instrumentor's tracer and policy.
    #[cfg(feature = "chat")]
    pub fn instrument_chat_model<M>(&self, model: M) -> crate::instrumentation::TracedChatModel<M> {
        crate::instrumentation::TracedChatModel::new(
            model,
            Arc::clone(&self.tracer),
            self.config.clone(),
        )
    }

    fn interceptor(&self, target: &WrappedMethod) -> Interceptor {
        Interceptor::new(Arc::clone(&self.tracer), target.span_name, self.config.clone())
    }
}

impl Default for Instrumentor {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring an [`Instrumentor`].
#[derive(Default)]
pub struct InstrumentorBuilder {
    tracer: Option<BoxedTracer>,
    config: Option<Config>,
}

impl InstrumentorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this tracer instead of the global one.
    pub fn tracer(mut self, tracer: BoxedTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Use this policy instead of the environment.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Instrumentor {
        let tracer = self
            .tracer
            .unwrap_or_else(|| global::tracer_with_scope(version::instrumentation_scope()));
        Instrumentor {
            tracer: Arc::new(tracer),
            config: self.config.unwrap_or_else(Config::from_env),
            originals: Mutex::new(None),
        }
    }
}
