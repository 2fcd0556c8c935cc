//! Instrumentation scope and the build version it reports.
//!
//! Tracers created by this crate carry a scope named after the crate whose
//! version is the package version plus the git commit it was built from, so
//! spans can be traced back to the exact instrumentation build.

use opentelemetry::InstrumentationScope;

/// Instrumentation scope name used for tracers created by this crate.
pub const SCOPE_NAME: &str = "llm-instrumentation";

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");
const GIT_DIRTY: Option<&str> = option_env!("VERGEN_GIT_DIRTY");

/// Scope version: `{version}+{sha}`, with `.dirty` appended for builds from
/// a modified tree. Plain `{version}` when git metadata is unavailable.
pub fn version_string() -> String {
    match GIT_SHA.filter(|sha| !sha.is_empty()) {
        Some(sha) => {
            let dirty = if GIT_DIRTY == Some("true") { ".dirty" } else { "" };
            format!("{PKG_VERSION}+{}{dirty}", &sha[..7.min(sha.len())])
        }
        None => PKG_VERSION.to_owned(),
    }
}

/// Instrumentation scope attached to every tracer this crate creates.
pub fn instrumentation_scope() -> InstrumentationScope {
    InstrumentationScope::builder(SCOPE_NAME)
        .with_version(version_string())
        .build()
}
