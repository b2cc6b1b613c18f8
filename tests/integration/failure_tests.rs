//! Panics, cancellation and instrumentation failures.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cachetrace::testing::{InMemoryStore, InMemoryTracer, StoreError};
use cachetrace::tracing_support::{
    Metrics, NeverSample, NoopTracer, ProbabilitySampler, SpanStatus, TraceContext,
};
use cachetrace::{CallContext, Command, CommandToggles, Commands, Instrumented, TraceOptions};

use crate::common::{TestFixture, traced_ctx};

/// A panicking delegate still ends its span and counts as abandoned.
#[tokio::test]
async fn test_panicking_delegate() {
    let fixture = TestFixture::new(TraceOptions::all());
    fixture.store.panic_next(Command::Eval, "script engine crashed");

    let client = Arc::clone(&fixture.client);
    let handle = tokio::spawn(async move {
        let ctx = traced_ctx();
        client.eval(&ctx, "anything", &[], &[]).await
    });
    let join = handle.await.expect_err("task should panic");
    assert!(join.is_panic());

    let spans = fixture.tracer.finished();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name(), "Eval");
    assert_eq!(spans[0].status(), &SpanStatus::Unknown("panicked".to_string()));
    assert_eq!(fixture.tracer.open(), 0);
    assert_eq!(fixture.counts("redis.eval"), (1, 0, 1));
}

/// A call dropped mid-flight ends its span and counts as abandoned.
#[tokio::test]
async fn test_cancelled_call() {
    let fixture = TestFixture::new(TraceOptions::all());
    fixture.store.hang_next(Command::LPop);

    let ctx = traced_ctx();
    let result =
        tokio::time::timeout(Duration::from_millis(20), fixture.client.lpop(&ctx, "jobs")).await;
    assert!(result.is_err(), "hung call should time out");

    let spans = fixture.tracer.finished();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status(), &SpanStatus::Unset);
    assert_eq!(fixture.counts("redis.lpop"), (1, 0, 1));

    // The next call is unaffected.
    assert_eq!(fixture.client.lpop(&ctx, "jobs").await.expect("lpop"), None);
    assert_eq!(fixture.counts("redis.lpop"), (2, 0, 1));
}

/// A sampler that drops everything leaves no span but still records the call.
#[tokio::test]
async fn test_sampler_drop_still_records() {
    let options = TraceOptions::builder()
        .sampler(Arc::new(NeverSample))
        .commands(CommandToggles::ALL)
        .build();
    let fixture = TestFixture::new(options);

    fixture.client.hset(&traced_ctx(), "h", "f", Bytes::from_static(b"v")).await.expect("hset");

    assert_eq!(fixture.tracer.started(), 0);
    assert_eq!(fixture.counts("redis.hset"), (1, 0, 0));
}

/// Ratio sampling is decided per trace: every call in one trace agrees.
#[tokio::test]
async fn test_probability_sampling_is_per_trace() {
    let options = TraceOptions::builder()
        .sampler(Arc::new(ProbabilitySampler::new(0.5)))
        .commands(CommandToggles::ALL)
        .build();
    let fixture = TestFixture::new(options);

    // An unsampled parent leaves the decision to the trace ID.
    let ctx = CallContext::with_parent(TraceContext::new_root().with_sampled(false));
    for _ in 0..10 {
        fixture.client.ping(&ctx).await.expect("ping");
    }

    let started = fixture.tracer.started();
    assert!(started == 0 || started == 10, "got {started} spans");
    assert_eq!(fixture.counts("redis.ping"), (10, 0, 0));
}

/// A tracer backend that refuses spans never fails the call.
#[tokio::test]
async fn test_failing_tracer_is_invisible() {
    let fixture = TestFixture::with_tracer(TraceOptions::all(), InMemoryTracer::failing());

    fixture.client.set(&traced_ctx(), "k", Bytes::from_static(b"v"), None).await.expect("set");
    let value = fixture.client.get(&traced_ctx(), "k").await.expect("get");
    assert_eq!(value, Some(Bytes::from_static(b"v")));

    assert!(fixture.tracer.finished().is_empty());
    assert_eq!(fixture.counts("redis.set"), (1, 0, 0));
    assert_eq!(fixture.counts("redis.get"), (1, 0, 0));
}

/// A failing tracer does not hide delegate errors either.
#[tokio::test]
async fn test_failing_tracer_keeps_delegate_error() {
    let fixture = TestFixture::with_tracer(TraceOptions::all(), InMemoryTracer::failing());
    fixture.store.fail_next(Command::Del, StoreError::injected("CROSSSLOT"));

    let err = fixture.client.del(&traced_ctx(), &["a", "b"]).await.expect_err("del should fail");
    assert_eq!(err, StoreError::injected("CROSSSLOT"));
    assert_eq!(fixture.counts("redis.del"), (1, 1, 0));
}

/// The default `tracing` backend never fails a call.
#[tokio::test]
async fn test_default_backend() {
    let metrics = Metrics::default();
    let client = Instrumented::builder(InMemoryStore::new())
        .options(TraceOptions::all())
        .recorder(Arc::new(metrics.clone()))
        .build();

    assert_eq!(client.incr(&traced_ctx(), "n").await.expect("incr"), 1);
    assert_eq!(metrics.snapshot().total_calls(), 1);
}

/// The no-op backend is accepted wherever a tracer is.
#[tokio::test]
async fn test_noop_tracer() {
    let client = Instrumented::builder(InMemoryStore::new())
        .options(TraceOptions::all())
        .tracer(Arc::new(NoopTracer))
        .build();

    assert_eq!(client.ping(&traced_ctx()).await.expect("ping"), "PONG");
}
