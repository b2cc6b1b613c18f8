//! The tracing and metrics decorator.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::client::{CommandFuture, Commands};
use crate::config::TraceOptions;
use crate::tracing_support::{
    CallContext, MetricsRecorder, NoopRecorder, SpanGuard, Tracer, TracingTracer, should_trace,
};
use crate::types::{CallOutcome, Command, Value};

/// A [`Commands`] client that traces and measures every call it forwards.
///
/// Each call is delegated to the wrapped client unchanged. Around it, the
/// decorator:
///
/// 1. decides whether the call is traced (the command must be enabled, and
///    the call must continue a trace unless root spans are allowed);
/// 2. opens a client span named after the command, subject to sampling;
/// 3. starts one metrics record named after the command and the
///    configured instance;
/// 4. runs the delegate;
/// 5. closes the span with `Ok`, or `Unknown` and the error's message;
/// 6. finishes the metrics record and returns the delegate's result as is.
///
/// Nothing the instrumentation does can fail a call: tracing backend and
/// sampling problems only mean the call has no span. If the delegate
/// panics, or the caller drops the future before it completes, the span is
/// still ended and the metrics record is reported as abandoned.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use cachetrace::prelude::*;
/// use cachetrace::testing::{InMemoryStore, InMemoryTracer};
/// use cachetrace::tracing_support::Metrics;
///
/// # tokio_test::block_on(async {
/// let tracer = Arc::new(InMemoryTracer::new());
/// let metrics = Metrics::default();
///
/// let client = Instrumented::builder(InMemoryStore::new())
///     .options(TraceOptions::builder().allow_root(true).commands(CommandToggles::ALL).build())
///     .tracer(tracer.clone())
///     .recorder(Arc::new(metrics.clone()))
///     .build();
///
/// client.incr(&CallContext::background(), "visits").await.unwrap();
///
/// assert_eq!(tracer.finished()[0].name(), "Incr");
/// assert_eq!(metrics.snapshot().get("redis.incr", "default").map(|s| s.calls), Some(1));
/// # });
/// ```
#[derive(bon::Builder)]
pub struct Instrumented<C> {
    #[builder(start_fn)]
    inner: C,
    #[builder(into, default = Arc::new(TraceOptions::default()))]
    options: Arc<TraceOptions>,
    #[builder(default = Arc::new(TracingTracer))]
    tracer: Arc<dyn Tracer>,
    #[builder(default = Arc::new(NoopRecorder))]
    recorder: Arc<dyn MetricsRecorder>,
}

impl<C: Commands> Instrumented<C> {
    /// Wraps `inner`, tracing through the `tracing` crate and recording no
    /// metrics.
    pub fn new(inner: C, options: TraceOptions) -> Self {
        Self::builder(inner).options(options).build()
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Returns the trace options.
    pub fn options(&self) -> &TraceOptions {
        &self.options
    }

    async fn dispatch<T, F, Fut>(
        &self,
        ctx: &CallContext,
        command: Command,
        delegate: F,
    ) -> Result<T, C::Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, C::Error>>,
    {
        let options = self.options.as_ref();
        let traced =
            should_trace(ctx.has_parent(), options.is_enabled(command), options.allow_root());
        let span = if traced {
            SpanGuard::open(ctx, command.name(), options, self.tracer.as_ref())
        } else {
            SpanGuard::absent()
        };
        tracing::trace!(%command, traced, span = span.is_open(), "dispatching command");

        let record =
            self.recorder.record_call(ctx, command.metric_name(), options.instance_name());

        let result = delegate().await;

        span.close_with_error(result.as_ref().err());
        record.finish(&CallOutcome::from_result(&result));
        result
    }
}

impl<C: Clone> Clone for Instrumented<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            options: Arc::clone(&self.options),
            tracer: Arc::clone(&self.tracer),
            recorder: Arc::clone(&self.recorder),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for Instrumented<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("inner", &self.inner)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: Commands> Commands for Instrumented<C> {
    type Error = C::Error;

    fn get<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Get, move || self.inner.get(ctx, key)))
    }

    fn set<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> CommandFuture<'a, (), Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Set, move || self.inner.set(ctx, key, value, ttl)))
    }

    fn incr<'a>(&'a self, ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Incr, move || self.inner.incr(ctx, key)))
    }

    fn ping<'a>(&'a self, ctx: &'a CallContext) -> CommandFuture<'a, String, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Ping, move || self.inner.ping(ctx)))
    }

    fn del<'a>(
        &'a self,
        ctx: &'a CallContext,
        keys: &'a [&'a str],
    ) -> CommandFuture<'a, i64, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Del, move || self.inner.del(ctx, keys)))
    }

    fn set_nx<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::SetNx, move || self.inner.set_nx(ctx, key, value)))
    }

    fn close<'a>(&'a self, ctx: &'a CallContext) -> CommandFuture<'a, (), Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Close, move || self.inner.close(ctx)))
    }

    fn eval<'a>(
        &'a self,
        ctx: &'a CallContext,
        script: &'a str,
        keys: &'a [&'a str],
        args: &'a [Bytes],
    ) -> CommandFuture<'a, Value, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Eval, move || self.inner.eval(ctx, script, keys, args)))
    }

    fn lpop<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::LPop, move || self.inner.lpop(ctx, key)))
    }

    fn rpop<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::RPop, move || self.inner.rpop(ctx, key)))
    }

    fn lpush<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::LPush, move || self.inner.lpush(ctx, key, values)))
    }

    fn rpush<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::RPush, move || self.inner.rpush(ctx, key, values)))
    }

    fn hset<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::HSet, move || self.inner.hset(ctx, key, field, value)))
    }

    fn hget<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::HGet, move || self.inner.hget(ctx, key, field)))
    }

    fn hlen<'a>(&'a self, ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::HLen, move || self.inner.hlen(ctx, key)))
    }

    fn expire<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        ttl: Duration,
    ) -> CommandFuture<'a, bool, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::Expire, move || self.inner.expire(ctx, key, ttl)))
    }

    fn expire_at<'a>(
        &'a self,
        ctx: &'a CallContext,
        key: &'a str,
        at: DateTime<Utc>,
    ) -> CommandFuture<'a, bool, Self::Error> {
        Box::pin(self.dispatch(ctx, Command::ExpireAt, move || self.inner.expire_at(ctx, key, at)))
    }
}
