//! Instrumentation-domain errors.

use std::borrow::Cow;

use crate::tracing_support::TraceContextError;

/// An error raised by the instrumentation machinery itself.
///
/// These errors surface only at backend seams ([`Tracer`]) and from
/// explicit parse functions such as [`CallContext::from_traceparent`].
/// Command dispatch swallows them and continues without a span.
///
/// [`Tracer`]: crate::tracing_support::Tracer
/// [`CallContext::from_traceparent`]: crate::tracing_support::CallContext::from_traceparent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TraceError {
    /// The backend declined to record the span.
    #[error("span not sampled")]
    NotSampled,

    /// The tracing backend failed to start a span.
    #[error("tracing backend error: {0}")]
    Backend(Cow<'static, str>),

    /// A propagated trace context could not be parsed.
    #[error("invalid trace context: {0}")]
    InvalidTraceContext(#[from] TraceContextError),
}

impl TraceError {
    /// Creates a backend error with the given message.
    pub fn backend(message: impl Into<Cow<'static, str>>) -> Self {
        TraceError::Backend(message.into())
    }
}
