//! A tracing backend that keeps finished spans in memory.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TraceError};
use crate::tracing_support::{
    ActiveSpan, Attribute, FinishedSpan, SpanData, SpanRequest, SpanStatus, TraceContext, Tracer,
};

/// A [`Tracer`] that records every span it starts.
///
/// Clones share the same recording, so a test can hand one clone to the
/// client under test and inspect the other.
///
/// ## Example
///
/// ```rust
/// use cachetrace::testing::InMemoryTracer;
/// use cachetrace::tracing_support::{SpanKind, SpanRequest, TraceContext, Tracer};
///
/// let tracer = InMemoryTracer::new();
/// let span = tracer
///     .start_span(SpanRequest {
///         name: "Get",
///         kind: SpanKind::Client,
///         context: TraceContext::new_root(),
///     })
///     .unwrap();
/// assert_eq!(tracer.open(), 1);
///
/// span.end();
/// assert_eq!(tracer.finished()[0].name(), "Get");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
    state: Arc<Mutex<TracerState>>,
    failing: bool,
}

#[derive(Debug, Default)]
struct TracerState {
    started: usize,
    finished: Vec<FinishedSpan>,
}

impl InMemoryTracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer whose backend refuses every span.
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    /// Returns the number of spans started.
    pub fn started(&self) -> usize {
        self.state.lock().started
    }

    /// Returns the number of spans started but not yet ended.
    pub fn open(&self) -> usize {
        let state = self.state.lock();
        state.started - state.finished.len()
    }

    /// Returns the ended spans, in the order they ended.
    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.state.lock().finished.clone()
    }

    /// Forgets every recorded span.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.started = 0;
        state.finished.clear();
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, request: SpanRequest<'_>) -> Result<Box<dyn ActiveSpan>> {
        if self.failing {
            return Err(TraceError::backend("exporter unavailable"));
        }
        self.state.lock().started += 1;
        Ok(Box::new(InMemorySpan {
            data: SpanData::start(request.name, request.kind, request.context),
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemorySpan {
    data: SpanData,
    state: Arc<Mutex<TracerState>>,
}

impl ActiveSpan for InMemorySpan {
    fn context(&self) -> &TraceContext {
        self.data.context()
    }

    fn add_attributes(&mut self, attributes: &[Attribute]) {
        self.data.add_attributes(attributes);
    }

    fn set_status(&mut self, status: SpanStatus) {
        self.data.set_status(status);
    }

    fn end(self: Box<Self>) {
        let span = self.data.finish();
        self.state.lock().finished.push(span);
    }
}
