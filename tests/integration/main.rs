//! Integration tests for cachetrace.
//!
//! The tests drive an [`Instrumented`](cachetrace::Instrumented) client over
//! the in-memory store and inspect the spans and metrics it produced. No
//! server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration
//!
//! # With instrumentation logs
//! RUST_LOG=cachetrace=trace cargo test --test integration -- --nocapture
//! ```

mod common;
mod concurrency_tests;
mod dispatch_tests;
mod failure_tests;
mod options_tests;
