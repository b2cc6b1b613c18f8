//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for easy importing:
//!
//! ```rust
//! use cachetrace::prelude::*;
//! ```
//!
//! This provides access to:
//! - The command trait and its decorator
//! - Trace configuration
//! - Call context
//! - Common data types

pub use crate::{
    client::{CommandFuture, Commands, Instrumented},
    config::{CommandToggles, TraceOptions},
    error::TraceError,
    tracing_support::{CallContext, Metrics, MetricsRecorder, Sampler, Tracer},
    types::{CallOutcome, CallStatus, Command, Value},
};
