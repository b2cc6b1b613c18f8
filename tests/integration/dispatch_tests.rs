//! Per-call dispatch: span naming, status, error passthrough and metrics.

use bytes::Bytes;
use cachetrace::testing::StoreError;
use cachetrace::tracing_support::{Attribute, SpanKind, SpanStatus, TraceContext};
use cachetrace::{CallContext, Command, Commands, TraceOptions};

use crate::common::{TestFixture, issue, traced_ctx};

/// Every command opens one span named after it and records one call under
/// its metric name.
#[tokio::test]
async fn test_every_command_is_instrumented() {
    let fixture = TestFixture::new(TraceOptions::all());
    let ctx = traced_ctx();

    // Close last; everything after it would fail.
    let order: Vec<Command> = Command::ALL
        .into_iter()
        .filter(|c| *c != Command::Close)
        .chain([Command::Close])
        .collect();

    for command in &order {
        let result = issue(fixture.client.as_ref(), &ctx, *command).await;
        assert!(result.is_ok(), "{command} failed: {:?}", result.err());
    }

    let spans = fixture.tracer.finished();
    assert_eq!(spans.len(), order.len());
    for (span, command) in spans.iter().zip(&order) {
        assert_eq!(span.name(), command.name());
        assert_eq!(span.kind(), SpanKind::Client);
        assert_eq!(span.status(), &SpanStatus::Ok);
        assert_eq!(fixture.counts(command.metric_name()), (1, 0, 0), "{command}");
    }
}

/// Spans continue the caller's trace.
#[tokio::test]
async fn test_span_is_child_of_parent() {
    let fixture = TestFixture::new(TraceOptions::all());
    let parent = TraceContext::new_root();
    let ctx = CallContext::with_parent(parent.clone());

    fixture.client.ping(&ctx).await.expect("ping should succeed");

    let span = &fixture.tracer.finished()[0];
    assert_eq!(span.context().trace_id(), parent.trace_id());
    assert_eq!(span.context().parent_span_id(), Some(parent.span_id()));
    assert_ne!(span.context().span_id(), parent.span_id());
}

/// A propagated `traceparent` header works as the parent.
#[tokio::test]
async fn test_traceparent_parent() {
    let fixture = TestFixture::new(TraceOptions::all());
    let ctx =
        CallContext::from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .expect("valid traceparent");

    fixture.client.get(&ctx, "k").await.expect("get should succeed");

    let span = &fixture.tracer.finished()[0];
    assert_eq!(span.context().trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
}

/// Delegate errors come back unchanged and become the span's status.
#[tokio::test]
async fn test_error_passthrough() {
    let fixture = TestFixture::new(TraceOptions::all());
    let injected = StoreError::injected("MOVED 3999 127.0.0.1:6381");
    fixture.store.fail_next(Command::HGet, injected.clone());

    let err = fixture.client.hget(&traced_ctx(), "h", "f").await.expect_err("hget should fail");
    assert_eq!(err, injected);

    let span = &fixture.tracer.finished()[0];
    assert_eq!(span.status(), &SpanStatus::Unknown("MOVED 3999 127.0.0.1:6381".to_string()));
    assert_eq!(span.status().code(), Some(2));
    assert_eq!(fixture.counts("redis.hget"), (1, 1, 0));
}

/// Store-domain errors are reported the same way as injected ones.
#[tokio::test]
async fn test_wrong_type_error_passthrough() {
    let fixture = TestFixture::new(TraceOptions::all());
    let ctx = traced_ctx();
    fixture.client.hset(&ctx, "h", "f", Bytes::from_static(b"v")).await.expect("hset");

    let err = fixture.client.get(&ctx, "h").await.expect_err("get on a hash should fail");
    assert_eq!(err, StoreError::WrongType);

    let spans = fixture.tracer.finished();
    assert_eq!(spans[1].status(), &SpanStatus::Unknown(StoreError::WrongType.to_string()));
}

/// Results are returned exactly as the store produced them.
#[tokio::test]
async fn test_values_pass_through() {
    let fixture = TestFixture::new(TraceOptions::all());
    let ctx = traced_ctx();

    fixture.client.set(&ctx, "k", Bytes::from_static(b"v"), None).await.expect("set");
    let value = fixture.client.get(&ctx, "k").await.expect("get");
    assert_eq!(value, Some(Bytes::from_static(b"v")));

    assert_eq!(fixture.client.incr(&ctx, "n").await.expect("incr"), 1);
    assert_eq!(fixture.client.incr(&ctx, "n").await.expect("incr"), 2);
    assert_eq!(fixture.client.ping(&ctx).await.expect("ping"), "PONG");
}

/// Default attributes are attached to every span, in order.
#[tokio::test]
async fn test_default_attributes() {
    let options = TraceOptions::builder()
        .default_attributes(vec![
            Attribute::new("db.system", "redis"),
            Attribute::new("db.index", 0i64),
        ])
        .instance_name("cache1")
        .commands(cachetrace::CommandToggles::ALL)
        .build();
    let fixture = TestFixture::new(options);

    fixture.client.incr(&traced_ctx(), "n").await.expect("incr");

    let span = &fixture.tracer.finished()[0];
    let keys: Vec<&str> = span.attributes().iter().map(Attribute::key).collect();
    assert_eq!(keys, vec!["db.system", "db.index", "cache.instance"]);
    assert_eq!(fixture.counts_for("redis.incr", "cache1"), (1, 0, 0));
}

/// `close` reports the store's real error, once, to metrics and to the span.
#[tokio::test]
async fn test_close_error_reported_once() {
    let fixture = TestFixture::new(TraceOptions::all());
    let ctx = traced_ctx();

    fixture.client.close(&ctx).await.expect("first close should succeed");
    let err = fixture.client.close(&ctx).await.expect_err("second close should fail");
    assert_eq!(err, StoreError::Closed);

    assert_eq!(fixture.counts("redis.close"), (2, 1, 0));
    let spans = fixture.tracer.finished();
    assert_eq!(spans[0].status(), &SpanStatus::Ok);
    assert_eq!(spans[1].status(), &SpanStatus::Unknown("redis: client is closed".to_string()));

    // Commands after close fail with the store's error, instrumented as usual.
    let err = fixture.client.ping(&ctx).await.expect_err("ping after close");
    assert_eq!(err, StoreError::Closed);
    assert_eq!(fixture.counts("redis.ping"), (1, 1, 0));
}

/// The decorator is itself a `Commands` implementation and can be stacked
/// or used as a trait object.
#[tokio::test]
async fn test_decorator_as_trait_object() {
    let fixture = TestFixture::new(TraceOptions::all());
    let client: &dyn Commands<Error = StoreError> = fixture.client.as_ref();

    client.rpush(&traced_ctx(), "q", vec![Bytes::from_static(b"job")]).await.expect("rpush");
    assert_eq!(fixture.tracer.finished()[0].name(), "RPush");
    assert_eq!(fixture.store.calls(), vec![Command::RPush]);
}
