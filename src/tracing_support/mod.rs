//! Tracing and metrics plumbing for instrumented calls.
//!
//! ## Pieces
//!
//! - [`CallContext`] / [`TraceContext`]: the ambient trace a call belongs to
//! - [`should_trace`]: whether a call gets a span at all
//! - [`Sampler`]: whether a span that could be opened is kept
//! - [`Tracer`] / [`ActiveSpan`]: the span backend
//! - [`SpanGuard`]: the span of one call, closed exactly once
//! - [`MetricsRecorder`] / [`CallRecord`]: one metrics record per call
//!
//! ## Example
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//! use cachetrace::{CallContext, Commands, Instrumented, TraceOptions};
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//!
//! // Continue the trace of an incoming request
//! let ctx = CallContext::from_traceparent(header)?;
//!
//! let client = Instrumented::new(store, TraceOptions::all());
//! let value = client.get(&ctx, "session:42").await?;
//! ```

mod context;
mod decision;
mod lifecycle;
mod metrics;
mod sampler;
mod span;
mod tracer;

pub use context::{CallContext, SpanId, TraceContext, TraceContextError, TraceFlags, TraceId};
pub use decision::should_trace;
pub use lifecycle::SpanGuard;
#[cfg(feature = "metrics")]
pub use metrics::FacadeRecorder;
pub use metrics::{
    CallFinalizer, CallRecord, CallStats, Metrics, MetricsConfig, MetricsRecorder,
    MetricsSnapshot, NoopRecorder,
};
pub use sampler::{
    AlwaysSample, NeverSample, ParentBasedSampler, ProbabilitySampler, Sampler, SamplingDecision,
    SamplingParameters,
};
pub use span::{
    Attribute, AttributeValue, FinishedSpan, SpanData, SpanKind, SpanStatus, attribute_keys,
};
pub use tracer::{ActiveSpan, NoopTracer, SpanRequest, Tracer, TracingTracer};
