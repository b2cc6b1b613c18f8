//! Span lifecycle for one instrumented call.
//!
//! A call's span goes `absent → open → closed`. [`SpanGuard`] owns the open
//! span: both closing operations consume the guard, and dropping a guard
//! that is still open closes it, so every exit path of the enclosing call
//! (early return, panic, cancelled future) ends the span exactly once.

use std::fmt;

use crate::config::TraceOptions;
use crate::tracing_support::{
    ActiveSpan, CallContext, SamplingParameters, SpanKind, SpanRequest, SpanStatus, TraceContext,
    Tracer,
};

/// The span of one call, or its absence.
#[must_use = "dropping the guard ends the span without a status"]
pub struct SpanGuard {
    span: Option<Box<dyn ActiveSpan>>,
}

impl SpanGuard {
    /// A guard with no span.
    pub fn absent() -> Self {
        Self { span: None }
    }

    /// Opens a client span named `name` under the context's active span,
    /// or as a new root when there is none.
    ///
    /// The span starts only if the sampler keeps it and the tracer accepts
    /// it. Every default attribute is attached right away. Anything that
    /// goes wrong here yields an absent guard; it is never an error for the
    /// caller.
    pub fn open(
        ctx: &CallContext,
        name: &str,
        options: &TraceOptions,
        tracer: &dyn Tracer,
    ) -> Self {
        let parent = ctx.parent();
        let context = parent.map_or_else(TraceContext::new_root, TraceContext::child);

        let decision = options.sampler().should_sample(&SamplingParameters {
            parent,
            trace_id: context.trace_id(),
            name,
            kind: SpanKind::Client,
        });
        if !decision.is_sampled() {
            tracing::trace!(span = name, "span dropped by sampler");
            return Self::absent();
        }

        let request =
            SpanRequest { name, kind: SpanKind::Client, context: context.with_sampled(true) };
        match tracer.start_span(request) {
            Ok(mut span) => {
                if !options.default_attributes().is_empty() {
                    span.add_attributes(options.default_attributes());
                }
                Self { span: Some(span) }
            },
            Err(err) => {
                tracing::debug!(span = name, error = %err, "continuing without span");
                Self::absent()
            },
        }
    }

    /// Returns `true` if a span is open.
    pub fn is_open(&self) -> bool {
        self.span.is_some()
    }

    /// Returns the open span's context.
    pub fn context(&self) -> Option<&TraceContext> {
        self.span.as_deref().map(ActiveSpan::context)
    }

    /// Sets the status from the call's error and ends the span.
    ///
    /// No error means `Ok`; an error means `Unknown` with its message.
    pub fn close_with_error<E: fmt::Display + ?Sized>(mut self, err: Option<&E>) {
        if let Some(mut span) = self.span.take() {
            span.set_status(SpanStatus::from_error(err));
            span.end();
        }
    }

    /// Ends the span without setting a status.
    pub fn close(mut self) {
        if let Some(span) = self.span.take() {
            span.end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let Some(mut span) = self.span.take() else {
            return;
        };
        if std::thread::panicking() {
            tracing::warn!("command panicked with an open span");
            span.set_status(SpanStatus::Unknown("panicked".to_string()));
        }
        span.end();
    }
}

impl fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGuard").field("context", &self.context()).finish()
    }
}
