//! Test doubles for code built on [`Commands`](crate::Commands).
//!
//! - [`InMemoryStore`]: a store with real Redis semantics, a call log and
//!   fault injection
//! - [`InMemoryTracer`]: a span backend that keeps every finished span
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cachetrace::prelude::*;
//! use cachetrace::testing::{InMemoryStore, InMemoryTracer, StoreError};
//! use cachetrace::tracing_support::{SpanStatus, TraceContext};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryStore::new();
//! let tracer = Arc::new(InMemoryTracer::new());
//! let client = Instrumented::builder(store.clone())
//!     .options(TraceOptions::all())
//!     .tracer(tracer.clone())
//!     .build();
//!
//! store.fail_next(Command::Get, StoreError::injected("LOADING"));
//! let ctx = CallContext::with_parent(TraceContext::new_root());
//! assert!(client.get(&ctx, "k").await.is_err());
//!
//! assert_eq!(tracer.finished()[0].status(), &SpanStatus::Unknown("LOADING".into()));
//! # });
//! ```

mod store;
mod store_error;
mod tracer;

pub use store::{InMemoryStore, ScriptHandler};
pub use store_error::StoreError;
pub use tracer::InMemoryTracer;
