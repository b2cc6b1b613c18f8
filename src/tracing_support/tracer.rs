//! Tracing backends.
//!
//! The instrumentation layer talks to a backend through two small traits:
//! [`Tracer`] starts spans and [`ActiveSpan`] is the handle to one open
//! span. [`TracingTracer`] bridges into the `tracing` ecosystem, so any
//! subscriber (fmt, OpenTelemetry, ...) receives command spans.

use std::fmt;

use tracing::field;

use crate::error::{Result, TraceError};
use crate::tracing_support::{Attribute, SpanData, SpanKind, SpanStatus, TraceContext};

/// What the lifecycle asks a backend to start.
#[derive(Debug, Clone)]
pub struct SpanRequest<'a> {
    /// The span name (the command name).
    pub name: &'a str,
    /// The span kind.
    pub kind: SpanKind,
    /// The new span's identity. Carries a parent span ID for child spans.
    pub context: TraceContext,
}

/// A backend capable of starting spans.
pub trait Tracer: Send + Sync {
    /// Starts a span.
    ///
    /// An error means the call goes untraced; it never fails the call.
    fn start_span(&self, request: SpanRequest<'_>) -> Result<Box<dyn ActiveSpan>>;
}

/// An open span.
///
/// `end` consumes the handle, so a span cannot be ended twice.
pub trait ActiveSpan: Send {
    /// Returns the span's trace context.
    fn context(&self) -> &TraceContext;

    /// Appends attributes to the span.
    fn add_attributes(&mut self, attributes: &[Attribute]);

    /// Sets the terminal status.
    fn set_status(&mut self, status: SpanStatus);

    /// Ends the span.
    fn end(self: Box<Self>);
}

/// Emits command spans as `tracing` spans.
///
/// Spans are named `cache.command` and carry OpenTelemetry-style fields:
/// `otel.name` (the command), `otel.kind`, `otel.status_code`,
/// `otel.status_message`, plus `trace_id`, `span_id`, `parent_span_id` and
/// the default attributes joined into `cache.attributes`.
///
/// When the current subscriber's filter disables the span, the backend
/// reports [`TraceError::NotSampled`] and the call proceeds without a span.
/// Whether a span is disabled follows `tracing`'s callsite interest cache,
/// so in a process that switches between scoped dispatchers a span may be
/// created and simply go nowhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_span(&self, request: SpanRequest<'_>) -> Result<Box<dyn ActiveSpan>> {
        let ctx = &request.context;
        let span = tracing::info_span!(
            "cache.command",
            otel.name = request.name,
            otel.kind = %request.kind,
            trace_id = %ctx.trace_id(),
            span_id = %ctx.span_id(),
            parent_span_id = field::Empty,
            cache.attributes = field::Empty,
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
        );
        if span.is_disabled() {
            return Err(TraceError::NotSampled);
        }
        if let Some(parent) = ctx.parent_span_id() {
            span.record("parent_span_id", field::display(parent));
        }

        Ok(Box::new(TracingSpan {
            span,
            data: SpanData::start(request.name, request.kind, request.context),
        }))
    }
}

struct TracingSpan {
    span: tracing::Span,
    data: SpanData,
}

impl fmt::Debug for TracingSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingSpan").field("data", &self.data).finish()
    }
}

impl ActiveSpan for TracingSpan {
    fn context(&self) -> &TraceContext {
        self.data.context()
    }

    fn add_attributes(&mut self, attributes: &[Attribute]) {
        self.data.add_attributes(attributes);
        let joined =
            self.data.attributes().iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        self.span.record("cache.attributes", joined.as_str());
    }

    fn set_status(&mut self, status: SpanStatus) {
        match &status {
            SpanStatus::Unset => {},
            SpanStatus::Ok => {
                self.span.record("otel.status_code", "OK");
            },
            SpanStatus::Unknown(message) => {
                self.span.record("otel.status_code", "ERROR");
                self.span.record("otel.status_message", message.as_str());
            },
        }
        self.data.set_status(status);
    }

    fn end(self: Box<Self>) {
        let TracingSpan { span, data } = *self;
        let finished = data.finish();
        tracing::trace!(
            parent: &span,
            elapsed_us = finished.duration().as_micros() as u64,
            status = %finished.status(),
            "span ended"
        );
    }
}

/// A backend whose spans do nothing.
///
/// Useful when only metrics are wanted, or to measure the cost of the
/// decision and lifecycle machinery on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, request: SpanRequest<'_>) -> Result<Box<dyn ActiveSpan>> {
        Ok(Box::new(NoopSpan { context: request.context }))
    }
}

#[derive(Debug)]
struct NoopSpan {
    context: TraceContext,
}

impl ActiveSpan for NoopSpan {
    fn context(&self) -> &TraceContext {
        &self.context
    }

    fn add_attributes(&mut self, _attributes: &[Attribute]) {}

    fn set_status(&mut self, _status: SpanStatus) {}

    fn end(self: Box<Self>) {}
}
