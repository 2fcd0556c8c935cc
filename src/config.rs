//! Instrumentation policy configuration.
//!
//! Two policy flags drive the instrumentation:
//!
//! - `send_prompts`: record prompt and completion text on spans
//!   (env: `TRACELOOP_TRACE_CONTENT`, default `true`)
//! - `metrics_enabled`: create metric instruments and record data points
//!   (env: `TRACELOOP_METRICS_ENABLED`, default `true`)
//!
//! The configuration is loaded once, at install time, and handed to every
//! wrapper by value. Nothing reads the environment after that.
//!
//! A TOML file may be used instead of the environment:
//!
//! ```toml
//! send_prompts = false
//! metrics_enabled = true
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::{InstrumentationError, Result};

/// Environment variable controlling prompt/completion capture.
pub const ENV_TRACE_CONTENT: &str = "TRACELOOP_TRACE_CONTENT";

/// Environment variable controlling metric recording.
pub const ENV_METRICS_ENABLED: &str = "TRACELOOP_METRICS_ENABLED";

/// Instrumentation policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Record prompts and completions as span attributes (default: true).
    #[serde(default = "default_true")]
    pub send_prompts: bool,
    /// Create metric instruments and record data points (default: true).
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            send_prompts: true,
            metrics_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Create a config with both flags on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable prompt/completion capture.
    pub fn send_prompts(mut self, enabled: bool) -> Self {
        self.send_prompts = enabled;
        self
    }

    /// Enable or disable metrics.
    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Load the policy from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the policy through an arbitrary variable lookup.
    ///
    /// A flag is on when its variable is unset or equals `"true"`
    /// (case-insensitive); any other value turns it off.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            lookup(name)
                .map(|value| value.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true)
        };
        Self {
            send_prompts: flag(ENV_TRACE_CONTENT),
            metrics_enabled: flag(ENV_METRICS_ENABLED),
        }
    }

    /// Parse the policy from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            InstrumentationError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    /// Load the policy from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstrumentationError::Configuration(format!(
                "Failed to read config file {path:?}: {e}"
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
