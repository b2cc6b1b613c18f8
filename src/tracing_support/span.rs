//! Span data types shared by tracing backends.

use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::tracing_support::TraceContext;

/// Kind of span, indicating its role in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    /// An outgoing request to a remote service. Every command span is a client span.
    #[default]
    Client,
    /// Work that stays inside the process.
    Internal,
}

impl SpanKind {
    /// Returns the OpenTelemetry span kind value.
    pub fn otel_value(&self) -> i32 {
        match self {
            SpanKind::Internal => 1,
            SpanKind::Client => 3,
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanKind::Client => f.write_str("client"),
            SpanKind::Internal => f.write_str("internal"),
        }
    }
}

/// Terminal status of a span.
///
/// Codes follow the canonical status codes: `Ok` is 0 and `Unknown` is 2.
/// A span that is ended without an explicit status stays `Unset`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    /// No status was set before the span ended.
    #[default]
    Unset,
    /// The traced call succeeded.
    Ok,
    /// The traced call failed; carries the error's message.
    Unknown(String),
}

impl SpanStatus {
    /// Derives a status from an optional error: `Ok` when absent, otherwise
    /// `Unknown` with the error's display text.
    pub fn from_error<E: fmt::Display + ?Sized>(err: Option<&E>) -> Self {
        match err {
            None => SpanStatus::Ok,
            Some(err) => SpanStatus::Unknown(err.to_string()),
        }
    }

    /// Returns the canonical status code, or `None` when unset.
    pub fn code(&self) -> Option<i32> {
        match self {
            SpanStatus::Unset => None,
            SpanStatus::Ok => Some(0),
            SpanStatus::Unknown(_) => Some(2),
        }
    }

    /// Returns `true` if the status is `Ok`.
    pub fn is_ok(&self) -> bool {
        matches!(self, SpanStatus::Ok)
    }

    /// Returns the error message, if this is an `Unknown` status.
    pub fn message(&self) -> Option<&str> {
        match self {
            SpanStatus::Unknown(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanStatus::Unset => f.write_str("unset"),
            SpanStatus::Ok => f.write_str("ok"),
            SpanStatus::Unknown(msg) => write!(f, "unknown: {msg}"),
        }
    }
}

/// A key/value pair attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    key: Cow<'static, str>,
    value: AttributeValue,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<AttributeValue>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Returns the attribute key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the attribute value.
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A value that can be attached to a span as an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// An integer value.
    Int(i64),
    /// A float value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl AttributeValue {
    /// Returns the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Well-known attribute keys.
pub mod attribute_keys {
    /// The logical store instance a call was issued against.
    pub const CACHE_INSTANCE: &str = "cache.instance";
}

/// The mutable state of a span between start and end.
///
/// Backends wrap this to keep name, identity, attributes and status, and
/// turn it into a [`FinishedSpan`] when the span ends.
#[derive(Debug, Clone)]
pub struct SpanData {
    name: String,
    kind: SpanKind,
    context: TraceContext,
    attributes: Vec<Attribute>,
    status: SpanStatus,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl SpanData {
    /// Starts recording a span.
    pub fn start(name: impl Into<String>, kind: SpanKind, context: TraceContext) -> Self {
        Self {
            name: name.into(),
            kind,
            context,
            attributes: Vec::new(),
            status: SpanStatus::Unset,
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span's own trace context.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Returns the attributes recorded so far.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the current status.
    pub fn status(&self) -> &SpanStatus {
        &self.status
    }

    /// Appends attributes in order.
    pub fn add_attributes(&mut self, attributes: &[Attribute]) {
        self.attributes.extend_from_slice(attributes);
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    /// Returns the time elapsed since the span started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Ends the span.
    pub fn finish(self) -> FinishedSpan {
        FinishedSpan {
            duration: self.started.elapsed(),
            name: self.name,
            kind: self.kind,
            context: self.context,
            attributes: self.attributes,
            status: self.status,
            start_time: self.start_time,
        }
    }
}

/// A span that has ended.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    name: String,
    kind: SpanKind,
    context: TraceContext,
    attributes: Vec<Attribute>,
    status: SpanStatus,
    start_time: DateTime<Utc>,
    duration: Duration,
}

impl FinishedSpan {
    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the span's trace context.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Returns `true` if the span had no parent.
    pub fn is_root(&self) -> bool {
        self.context.parent_span_id().is_none()
    }

    /// Returns the span attributes, in the order they were added.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the first attribute with the given key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.key() == key).map(Attribute::value)
    }

    /// Returns the terminal status.
    pub fn status(&self) -> &SpanStatus {
        &self.status
    }

    /// Returns the wall-clock start time.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns how long the span was open.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
