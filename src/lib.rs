//! # cachetrace
//!
//! Transparent tracing and per-call metrics for key-value store clients.
//!
//! Wrap any [`Commands`] implementation in an [`Instrumented`] decorator and
//! every call it forwards gets, subject to configuration, one client span
//! named after the command and exactly one metrics record. Results and
//! errors pass through untouched.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cachetrace::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MyStoreError> {
//!     let options = TraceOptions::builder()
//!         .instance_name("sessions")
//!         .commands(CommandToggles::ALL)
//!         .build();
//!     let client = Instrumented::new(my_store_client, options);
//!
//!     // Continue the trace of the request being served
//!     let ctx = CallContext::from_traceparent(traceparent)?;
//!     client.set(&ctx, "session:42", payload, Some(ttl)).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Key Concepts
//!
//! - **Opt-in per command**: [`CommandToggles`] start all off
//! - **No orphan spans**: without `allow_root`, only calls made inside an
//!   existing trace open spans
//! - **Errors are the store's**: the decorator never wraps, translates or
//!   swallows a delegate error; a failing tracer never fails a call
//! - **Exactly once**: each call has at most one span and exactly one
//!   metrics record, even when it panics or is cancelled
//!
//! ## Features
//!
//! - `metrics`: `tracing_support::FacadeRecorder` reports calls through the
//!   `metrics` crate
//! - `redis`: [`RedisClient`] implements [`Commands`] over the `redis` crate

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod types;

// Tracing and metrics plumbing
pub mod tracing_support;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use client::{CommandFuture, Commands, Instrumented};
#[cfg(feature = "redis")]
pub use client::RedisClient;
pub use config::{CommandToggles, DEFAULT_INSTANCE_NAME, TraceOptions};
pub use error::TraceError;
pub use tracing_support::{CallContext, TraceContext};
pub use types::{CallOutcome, CallStatus, Command, Value};
