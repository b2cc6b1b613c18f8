//! Error types for the instrumentation layer.
//!
//! The crate deals with two independent error domains:
//!
//! - **Delegate errors** belong to the wrapped client (`Commands::Error`).
//!   They are returned to the caller exactly as produced and are never
//!   wrapped or translated.
//! - **Instrumentation errors** ([`TraceError`]) come from tracing backends
//!   and trace-context parsing. They never reach the caller of a command;
//!   a failing backend only means the call goes untraced.
//!
//! ```rust,ignore
//! // The store's own error comes back untouched...
//! let err = client.get(&ctx, "missing-type").await.unwrap_err();
//! assert_eq!(err, StoreError::WrongType);
//!
//! // ...while a misbehaving tracer is invisible to the caller.
//! ```

mod trace_error;

pub use trace_error::TraceError;

/// A specialized `Result` type for tracing backend operations.
pub type Result<T> = std::result::Result<T, TraceError>;
