//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create the span an engine enters for each step.
///
/// # Example
///
/// ```rust
/// use tandem::observability::span_engine;
///
/// let span = span_engine("cc-merge");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_engine(name: &str) -> Span {
    span!(Level::DEBUG, "engine", engine = %name)
}

/// Log an engine state change.
#[inline]
pub fn trace_state_change(from: &str, to: &str) {
    tracing::trace!(from = %from, to = %to, "merge state changed");
}

/// Log the error that halted an engine.
#[inline]
pub fn trace_halt(error: &dyn std::error::Error) {
    tracing::error!(error = %error, "merge engine halted");
}
