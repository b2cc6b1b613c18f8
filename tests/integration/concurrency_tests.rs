//! Concurrent calls through one shared client.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cachetrace::testing::StoreError;
use cachetrace::tracing_support::{SpanStatus, TraceContext};
use cachetrace::{CallContext, Command, Commands, TraceOptions};
use futures::future::join_all;

use crate::common::{TestFixture, issue};

const CALLS: usize = 100;

/// 100 tasks with distinct parents, spread over every command, each get
/// their own span in their own trace and exactly one metrics record.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_isolated() {
    let fixture = TestFixture::new(TraceOptions::all());
    // Close would fail every call after it.
    let commands: Vec<Command> =
        Command::ALL.into_iter().filter(|c| *c != Command::Close).collect();

    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let client = Arc::clone(&fixture.client);
            let command = commands[i % commands.len()];
            tokio::spawn(async move {
                let parent = TraceContext::new_root();
                let ctx = CallContext::with_parent(parent.clone());
                issue(client.as_ref(), &ctx, command).await?;
                Ok::<_, StoreError>((parent, command))
            })
        })
        .collect();

    let mut issued = HashMap::with_capacity(CALLS);
    for handle in handles {
        let (parent, command) = handle.await.expect("task").expect("call");
        issued.insert(parent.trace_id().to_string(), (parent, command));
    }
    assert_eq!(issued.len(), CALLS, "parents must be distinct traces");

    let spans = fixture.tracer.finished();
    assert_eq!(spans.len(), CALLS);
    for span in &spans {
        let (parent, command) =
            issued.get(&span.context().trace_id().to_string()).expect("span in a known trace");
        assert_eq!(span.name(), command.name());
        assert_eq!(span.context().parent_span_id(), Some(parent.span_id()));
        assert_eq!(span.status(), &SpanStatus::Ok);
    }

    let span_ids: HashSet<String> =
        spans.iter().map(|s| s.context().span_id().to_string()).collect();
    assert_eq!(span_ids.len(), CALLS);

    for (index, command) in commands.iter().enumerate() {
        let expected = (0..CALLS).filter(|i| i % commands.len() == index).count() as u64;
        assert_eq!(fixture.counts(command.metric_name()), (expected, 0, 0), "{command}");
    }
    assert_eq!(fixture.metrics.snapshot().total_calls(), CALLS as u64);
}

/// Mixed successes and failures in flight at once are each reported under
/// their own outcome.
#[tokio::test]
async fn test_concurrent_mixed_outcomes() {
    let fixture = TestFixture::new(TraceOptions::all());
    for _ in 0..10 {
        fixture.store.fail_next(Command::Incr, StoreError::injected("BUSY"));
    }

    let ctx = CallContext::with_parent(TraceContext::new_root());
    let keys: Vec<String> = (0..CALLS).map(|i| format!("counter:{i}")).collect();
    let results = join_all(keys.iter().map(|key| fixture.client.incr(&ctx, key))).await;

    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 10);
    assert!(results.iter().flatten().all(|n| *n == 1));

    assert_eq!(fixture.counts("redis.incr"), (CALLS as u64, 10, 0));
    let spans = fixture.tracer.finished();
    assert_eq!(spans.len(), CALLS);
    assert_eq!(spans.iter().filter(|s| s.status() == &SpanStatus::Ok).count(), CALLS - 10);
    assert_eq!(fixture.tracer.open(), 0);
}
