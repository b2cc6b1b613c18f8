//! Ambient call context and W3C trace-context identifiers.

use std::fmt;

use crate::error::TraceError;

/// The ambient context a command is issued under.
///
/// The context carries the identity of the caller's active span, if any.
/// Its presence decides whether an instrumented call opens a child span or,
/// when root spans are allowed, a new root.
///
/// ## Example
///
/// ```rust
/// use cachetrace::tracing_support::CallContext;
///
/// // No active span: calls are traced only when root spans are allowed.
/// let ctx = CallContext::background();
/// assert!(!ctx.has_parent());
///
/// // Continue a trace propagated from an incoming request.
/// let ctx = CallContext::from_traceparent(
///     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
/// ).unwrap();
/// assert!(ctx.has_parent());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    parent: Option<TraceContext>,
}

impl CallContext {
    /// A context without an active span.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose active span is `parent`.
    pub fn with_parent(parent: TraceContext) -> Self {
        Self { parent: Some(parent) }
    }

    /// Builds a context from a `traceparent` header value.
    pub fn from_traceparent(traceparent: &str) -> Result<Self, TraceError> {
        Ok(Self::with_parent(TraceContext::from_traceparent(traceparent)?))
    }

    /// Returns the active span's context, if any.
    pub fn parent(&self) -> Option<&TraceContext> {
        self.parent.as_ref()
    }

    /// Returns `true` if an active span is present.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }
}

impl From<TraceContext> for CallContext {
    fn from(parent: TraceContext) -> Self {
        Self::with_parent(parent)
    }
}

/// The identity of one span within a distributed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    flags: TraceFlags,
}

impl TraceContext {
    /// Creates a new sampled root context with random IDs.
    pub fn new_root() -> Self {
        Self::new(TraceId::random(), SpanId::random())
    }

    /// Creates a sampled context with the given IDs.
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self { trace_id, span_id, parent_span_id: None, flags: TraceFlags::SAMPLED }
    }

    /// Creates a child context: same trace, fresh span ID, this span as parent.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id.clone()),
            flags: self.flags,
        }
    }

    /// Parses a W3C `traceparent` header value (`version-traceid-spanid-flags`).
    ///
    /// ```rust
    /// use cachetrace::tracing_support::TraceContext;
    ///
    /// let ctx = TraceContext::from_traceparent(
    ///     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
    /// ).unwrap();
    /// assert_eq!(ctx.span_id().to_string(), "00f067aa0ba902b7");
    /// assert!(ctx.is_sampled());
    /// ```
    pub fn from_traceparent(traceparent: &str) -> Result<Self, TraceContextError> {
        let mut parts = traceparent.trim().split('-');
        let (Some(version), Some(trace_id), Some(span_id), Some(flags), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TraceContextError::InvalidFormat);
        };

        if version != "00" {
            return Err(TraceContextError::UnsupportedVersion);
        }

        Ok(Self {
            trace_id: TraceId::from_hex(trace_id)?,
            span_id: SpanId::from_hex(span_id)?,
            parent_span_id: None,
            flags: TraceFlags::from_hex(flags)?,
        })
    }

    /// Formats this context as a `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags.0)
    }

    /// Returns the trace ID.
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns the span ID.
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// Returns the parent span ID, if this context was derived from one.
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    /// Returns the trace flags.
    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    /// Returns `true` if the sampled flag is set.
    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// Sets or clears the sampled flag.
    #[must_use]
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.flags = if sampled {
            TraceFlags(self.flags.0 | TraceFlags::SAMPLED.0)
        } else {
            TraceFlags(self.flags.0 & !TraceFlags::SAMPLED.0)
        };
        self
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

// OS randomness can be unavailable (early boot, sandboxes); IDs still have
// to be produced, so fall back to the thread-local generator.
fn fill_random(bytes: &mut [u8]) {
    if getrandom::getrandom(bytes).is_err() {
        fastrand::fill(bytes);
    }
}

/// A 128-bit trace identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TraceId([u8; 16]);

impl TraceId {
    /// Creates a random, non-zero trace ID.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        while bytes == [0u8; 16] {
            fill_random(&mut bytes);
        }
        Self(bytes)
    }

    /// Creates a trace ID from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parses a 32-character lowercase hex trace ID. All-zero IDs are invalid.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        let mut bytes = [0u8; 16];
        if hex.len() != 32 || hex::decode_to_slice(hex, &mut bytes).is_err() || bytes == [0u8; 16]
        {
            return Err(TraceContextError::InvalidTraceId);
        }
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({self})")
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A 64-bit span identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// Creates a random, non-zero span ID.
    pub fn random() -> Self {
        let mut bytes = [0u8; 8];
        while bytes == [0u8; 8] {
            fill_random(&mut bytes);
        }
        Self(bytes)
    }

    /// Creates a span ID from raw bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Parses a 16-character hex span ID. All-zero IDs are invalid.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        let mut bytes = [0u8; 8];
        if hex.len() != 16 || hex::decode_to_slice(hex, &mut bytes).is_err() || bytes == [0u8; 8] {
            return Err(TraceContextError::InvalidSpanId);
        }
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({self})")
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Trace flags as defined by W3C Trace Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The trace is sampled.
    pub const SAMPLED: Self = Self(0x01);

    /// Parses a two-character hex flags field.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        if hex.len() != 2 {
            return Err(TraceContextError::InvalidFlags);
        }
        u8::from_str_radix(hex, 16).map(Self).map_err(|_| TraceContextError::InvalidFlags)
    }

    /// Returns `true` if the sampled flag is set.
    pub fn is_sampled(&self) -> bool {
        self.0 & Self::SAMPLED.0 != 0
    }

    /// Returns the raw flag value.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Error parsing a propagated trace context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TraceContextError {
    /// The header does not have four dash-separated fields.
    #[error("invalid traceparent format")]
    InvalidFormat,
    /// The version field is not `00`.
    #[error("unsupported trace context version")]
    UnsupportedVersion,
    /// The trace ID is malformed or all zeros.
    #[error("invalid trace ID")]
    InvalidTraceId,
    /// The span ID is malformed or all zeros.
    #[error("invalid span ID")]
    InvalidSpanId,
    /// The flags field is malformed.
    #[error("invalid trace flags")]
    InvalidFlags,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use test_case::test_case;

    use super::*;

    const HEADER: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_new_root() {
        let ctx = TraceContext::new_root();
        assert!(ctx.is_sampled());
        assert!(ctx.parent_span_id().is_none());
    }

    #[test]
    fn test_child_keeps_trace() {
        let parent = TraceContext::new_root();
        let child = parent.child();

        assert_eq!(child.trace_id(), parent.trace_id());
        assert_ne!(child.span_id(), parent.span_id());
        assert_eq!(child.parent_span_id(), Some(parent.span_id()));
        assert_eq!(child.flags(), parent.flags());
    }

    #[test]
    fn test_traceparent_roundtrip() {
        let ctx = TraceContext::from_traceparent(HEADER).unwrap();
        assert_eq!(ctx.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.to_traceparent(), HEADER);
    }

    #[test]
    fn test_unsampled_flags() {
        let ctx = TraceContext::from_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
        )
        .unwrap();
        assert!(!ctx.is_sampled());
        assert!(ctx.with_sampled(true).is_sampled());
    }

    #[test_case("not-a-header", TraceContextError::InvalidFormat ; "too few fields")]
    #[test_case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-ff", TraceContextError::InvalidFormat ; "too many fields")]
    #[test_case("01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", TraceContextError::UnsupportedVersion ; "future version")]
    #[test_case("00-00000000000000000000000000000000-00f067aa0ba902b7-01", TraceContextError::InvalidTraceId ; "zero trace id")]
    #[test_case("00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01", TraceContextError::InvalidSpanId ; "zero span id")]
    #[test_case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-zz", TraceContextError::InvalidFlags ; "bad flags")]
    fn test_traceparent_rejects(header: &str, expected: TraceContextError) {
        assert_eq!(TraceContext::from_traceparent(header), Err(expected));
    }

    #[test]
    fn test_call_context_parent() {
        assert!(!CallContext::background().has_parent());

        let ctx = CallContext::from_traceparent(HEADER).unwrap();
        assert_eq!(ctx.parent().unwrap().span_id().to_string(), "00f067aa0ba902b7");

        let err = CallContext::from_traceparent("garbage").unwrap_err();
        assert_eq!(err, TraceError::InvalidTraceContext(TraceContextError::InvalidFormat));
    }

    #[test]
    fn test_random_ids_are_nonzero() {
        for _ in 0..32 {
            assert_ne!(TraceId::random().as_bytes(), &[0u8; 16]);
            assert_ne!(SpanId::random().as_bytes(), &[0u8; 8]);
        }
    }
}
