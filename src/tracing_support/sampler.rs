//! Sampling policies.
//!
//! A [`Sampler`] decides whether a span that the trace decision allowed is
//! actually recorded. The instrumentation layer only consults the policy;
//! the policies below cover the common cases and anything else can be
//! plugged in by implementing the trait.

use std::fmt;

use crate::tracing_support::{SpanKind, TraceContext, TraceId};

/// The inputs a sampler decides on.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParameters<'a> {
    /// The caller's active span, if any.
    pub parent: Option<&'a TraceContext>,
    /// The trace the new span belongs to.
    pub trace_id: &'a TraceId,
    /// The span name.
    pub name: &'a str,
    /// The span kind.
    pub kind: SpanKind,
}

/// The outcome of a sampling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingDecision {
    /// Create and record the span.
    RecordAndSample,
    /// Do not create the span.
    Drop,
}

impl SamplingDecision {
    /// Returns `true` if the span should be recorded.
    pub fn is_sampled(&self) -> bool {
        matches!(self, SamplingDecision::RecordAndSample)
    }
}

impl From<bool> for SamplingDecision {
    fn from(sampled: bool) -> Self {
        if sampled { SamplingDecision::RecordAndSample } else { SamplingDecision::Drop }
    }
}

/// A policy deciding whether a span is recorded.
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Decides for one span.
    fn should_sample(&self, params: &SamplingParameters<'_>) -> SamplingDecision;
}

/// Records every span.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSample;

impl Sampler for AlwaysSample {
    fn should_sample(&self, _params: &SamplingParameters<'_>) -> SamplingDecision {
        SamplingDecision::RecordAndSample
    }
}

/// Records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSample;

impl Sampler for NeverSample {
    fn should_sample(&self, _params: &SamplingParameters<'_>) -> SamplingDecision {
        SamplingDecision::Drop
    }
}

/// Records a fixed fraction of traces.
///
/// The decision is a function of the trace ID, so every span of one trace
/// gets the same answer no matter which process takes it. A sampled parent
/// always yields a sampled child.
///
/// ```rust
/// use cachetrace::tracing_support::ProbabilitySampler;
///
/// let sampler = ProbabilitySampler::new(0.25);
/// assert_eq!(sampler.fraction(), 0.25);
/// assert_eq!(ProbabilitySampler::new(7.0).fraction(), 1.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ProbabilitySampler {
    fraction: f64,
    upper_bound: u64,
}

impl ProbabilitySampler {
    /// Creates a sampler for `fraction` of traces, clamped to `[0, 1]`.
    pub fn new(fraction: f64) -> Self {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        // Compared against the top 63 bits of the trace ID.
        let upper_bound = (fraction * (1u64 << 63) as f64) as u64;
        Self { fraction, upper_bound }
    }

    /// Returns the configured fraction.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl Sampler for ProbabilitySampler {
    fn should_sample(&self, params: &SamplingParameters<'_>) -> SamplingDecision {
        if params.parent.is_some_and(TraceContext::is_sampled) || self.fraction >= 1.0 {
            return SamplingDecision::RecordAndSample;
        }
        let mut high = [0u8; 8];
        high.copy_from_slice(&params.trace_id.as_bytes()[..8]);
        (u64::from_be_bytes(high) >> 1 < self.upper_bound).into()
    }
}

/// Follows the parent's sampled flag and samples root spans.
///
/// This is the default policy of [`TraceOptions`](crate::config::TraceOptions).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentBasedSampler;

impl Sampler for ParentBasedSampler {
    fn should_sample(&self, params: &SamplingParameters<'_>) -> SamplingDecision {
        params.parent.is_none_or(TraceContext::is_sampled).into()
    }
}
