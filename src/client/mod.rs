//! The store command surface and its instrumented decorator.
//!
//! - [`Commands`]: the operations a key-value store client offers
//! - [`Instrumented`]: wraps any [`Commands`] implementation with tracing
//!   and per-call metrics, and is itself a [`Commands`] implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use cachetrace::prelude::*;
//! use cachetrace::testing::InMemoryStore;
//!
//! # tokio_test::block_on(async {
//! let client = Instrumented::new(InMemoryStore::new(), TraceOptions::all());
//! let ctx = CallContext::background();
//!
//! client.set(&ctx, "greeting", "hello".into(), None).await?;
//! let value = client.get(&ctx, "greeting").await?;
//! assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), cachetrace::testing::StoreError>(())
//! # });
//! ```

mod instrumented;
#[cfg(feature = "redis")]
mod redis_client;

pub use instrumented::Instrumented;
#[cfg(feature = "redis")]
pub use redis_client::RedisClient;

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::tracing_support::CallContext;
use crate::types::Value;

/// The future returned by every [`Commands`] operation.
pub type CommandFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Object-safe trait for key-value store operations.
///
/// Each operation takes the caller's [`CallContext`] first. Implementations
/// that talk to a real server use it for nothing but may pass it on;
/// [`Instrumented`] reads the parent span from it.
///
/// ## Object Safety
///
/// With the error type fixed, the trait is object-safe:
///
/// ```rust
/// use cachetrace::{CallContext, Commands};
/// use cachetrace::testing::StoreError;
///
/// async fn touch(client: &dyn Commands<Error = StoreError>, key: &str) -> Result<i64, StoreError> {
///     client.incr(&CallContext::background(), key).await
/// }
/// ```
pub trait Commands: Send + Sync {
    /// The error produced by the store.
    type Error: StdError + Send + Sync + 'static;

    /// Returns the value stored at `key`, or `None` if it does not exist.
    fn get<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error>;

    /// Stores `value` at `key`, expiring after `ttl` when given.
    fn set<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> CommandFuture<'a, (), Self::Error>;

    /// Increments the integer at `key` and returns the new value.
    fn incr<'a>(&'a self, ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, Self::Error>;

    /// Checks the connection. Returns the server's reply.
    fn ping<'a>(&'a self, ctx: &'a CallContext) -> CommandFuture<'a, String, Self::Error>;

    /// Deletes `keys` and returns how many existed.
    fn del<'a>(
        &'a self,
        ctx: &'a CallContext,
        keys: &'a [&'a str],
    ) -> CommandFuture<'a, i64, Self::Error>;

    /// Stores `value` only if `key` does not exist. Returns whether it was set.
    fn set_nx<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, Self::Error>;

    /// Closes the client.
    fn close<'a>(&'a self, ctx: &'a CallContext) -> CommandFuture<'a, (), Self::Error>;

    /// Runs a server-side script.
    fn eval<'a>(
        &'a self,
        ctx: &'a CallContext,
        script: &'a str,
        keys: &'a [&'a str],
        args: &'a [Bytes],
    ) -> CommandFuture<'a, Value, Self::Error>;

    /// Removes and returns the first element of the list at `key`.
    fn lpop<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error>;

    /// Removes and returns the last element of the list at `key`.
    fn rpop<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error>;

    /// Prepends `values` to the list at `key`. Returns the new length.
    fn lpush<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, Self::Error>;

    /// Appends `values` to the list at `key`. Returns the new length.
    fn rpush<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, Self::Error>;

    /// Sets `field` of the hash at `key`. Returns `true` if the field is new.
    fn hset<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, Self::Error>;

    /// Returns `field` of the hash at `key`.
    fn hget<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error>;

    /// Returns the number of fields in the hash at `key`.
    fn hlen<'a>(&'a self, ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, Self::Error>;

    /// Expires `key` after `ttl`. Returns `false` if the key does not exist.
    fn expire<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        ttl: Duration,
    ) -> CommandFuture<'a, bool, Self::Error>;

    /// Expires `key` at `at`. Returns `false` if the key does not exist.
    fn expire_at<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        at: DateTime<Utc>,
    ) -> CommandFuture<'a, bool, Self::Error>;
}
