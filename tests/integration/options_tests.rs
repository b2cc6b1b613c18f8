//! Trace options as seen through an instrumented client.

use cachetrace::{CallContext, Command, CommandToggles, Commands, TraceOptions};
use test_case::test_case;

use crate::common::{TestFixture, traced_ctx};

#[test_case(true, true, false, 1 ; "parent, enabled")]
#[test_case(true, true, true, 1 ; "parent, enabled, roots allowed")]
#[test_case(false, true, false, 0 ; "no parent, enabled")]
#[test_case(false, true, true, 1 ; "no parent, enabled, roots allowed")]
#[test_case(true, false, true, 0 ; "parent, disabled")]
#[test_case(false, false, true, 0 ; "no parent, disabled")]
#[tokio::test]
async fn test_trace_decision(has_parent: bool, enabled: bool, allow_root: bool, spans: usize) {
    let options = TraceOptions::builder()
        .allow_root(allow_root)
        .commands(CommandToggles::NONE.with(Command::Get, enabled))
        .build();
    let fixture = TestFixture::new(options);
    let ctx = if has_parent { traced_ctx() } else { CallContext::background() };

    fixture.client.get(&ctx, "k").await.expect("get");

    assert_eq!(fixture.tracer.finished().len(), spans);
    // Traced or not, the call is always recorded.
    assert_eq!(fixture.counts("redis.get"), (1, 0, 0));
}

/// Without an explicit instance name, metrics use the default label and no
/// instance attribute is added.
#[tokio::test]
async fn test_default_instance_name() {
    let fixture = TestFixture::new(TraceOptions::all());
    fixture.client.ping(&traced_ctx()).await.expect("ping");

    assert_eq!(fixture.client.options().instance_name(), cachetrace::DEFAULT_INSTANCE_NAME);
    assert_eq!(fixture.counts_for("redis.ping", "default"), (1, 0, 0));
    assert!(fixture.tracer.finished()[0].attribute("cache.instance").is_none());
}

/// An explicit instance name yields exactly one instance attribute per span.
#[tokio::test]
async fn test_instance_name_attribute_not_duplicated() {
    let options = TraceOptions::builder()
        .instance_name("sessions")
        .commands(CommandToggles::ALL)
        .build();
    let fixture = TestFixture::new(options);
    let ctx = traced_ctx();

    for _ in 0..3 {
        fixture.client.ping(&ctx).await.expect("ping");
    }

    for span in fixture.tracer.finished() {
        let count = span.attributes().iter().filter(|a| a.key() == "cache.instance").count();
        assert_eq!(count, 1);
    }
    assert_eq!(fixture.counts_for("redis.ping", "sessions"), (3, 0, 0));
}

/// Per-command toggles can come from configuration files.
#[tokio::test]
async fn test_toggles_from_json() {
    let commands: CommandToggles =
        serde_json::from_str(r#"{"lpush": true, "lpop": true}"#).expect("valid toggles");
    let fixture = TestFixture::new(TraceOptions::builder().commands(commands).build());
    let ctx = traced_ctx();

    fixture.client.lpush(&ctx, "q", vec!["a".into()]).await.expect("lpush");
    fixture.client.rpop(&ctx, "q").await.expect("rpop");

    let names: Vec<String> =
        fixture.tracer.finished().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["LPush"]);
    assert_eq!(fixture.metrics.snapshot().total_calls(), 2);
}
