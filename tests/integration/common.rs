//! Common test harness for cachetrace integration tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use bytes::Bytes;
use cachetrace::testing::{InMemoryStore, InMemoryTracer};
use cachetrace::tracing_support::{Metrics, TraceContext};
use cachetrace::{CallContext, Command, Commands, Instrumented, TraceOptions, Value};
use chrono::{TimeDelta, Utc};
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer subscriber filtered by `RUST_LOG`.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An instrumented in-memory store plus handles to everything it reports to.
pub struct TestFixture {
    pub client: Arc<Instrumented<InMemoryStore>>,
    pub store: InMemoryStore,
    pub tracer: Arc<InMemoryTracer>,
    pub metrics: Metrics,
}

impl TestFixture {
    pub fn new(options: TraceOptions) -> Self {
        Self::with_tracer(options, InMemoryTracer::new())
    }

    pub fn with_tracer(options: TraceOptions, tracer: InMemoryTracer) -> Self {
        init_logging();

        let store = InMemoryStore::new();
        store.register_script("noop", |_, _| Ok(Value::Nil));
        let tracer = Arc::new(tracer);
        let metrics = Metrics::default();
        let client = Instrumented::builder(store.clone())
            .options(options)
            .tracer(tracer.clone())
            .recorder(Arc::new(metrics.clone()))
            .build();

        Self { client: Arc::new(client), store, tracer, metrics }
    }

    /// Returns `(calls, errors, abandoned)` for one operation on the default
    /// instance.
    pub fn counts(&self, operation: &str) -> (u64, u64, u64) {
        self.counts_for(operation, cachetrace::DEFAULT_INSTANCE_NAME)
    }

    pub fn counts_for(&self, operation: &str, instance: &str) -> (u64, u64, u64) {
        self.metrics
            .snapshot()
            .get(operation, instance)
            .map(|s| (s.calls, s.errors, s.abandoned))
            .unwrap_or_default()
    }
}

/// A context continuing a fresh sampled trace.
pub fn traced_ctx() -> CallContext {
    CallContext::with_parent(TraceContext::new_root())
}

/// Issues one call of `command` through `client`.
///
/// Each data type has its own key, so calls succeed in any order.
pub async fn issue<C: Commands>(
    client: &C,
    ctx: &CallContext,
    command: Command,
) -> Result<(), C::Error> {
    match command {
        Command::Get => client.get(ctx, "k").await.map(drop),
        Command::Set => client.set(ctx, "k", Bytes::from_static(b"v"), None).await,
        Command::Incr => client.incr(ctx, "n").await.map(drop),
        Command::Ping => client.ping(ctx).await.map(drop),
        Command::Del => client.del(ctx, &["k"]).await.map(drop),
        Command::SetNx => client.set_nx(ctx, "k", Bytes::from_static(b"v")).await.map(drop),
        Command::Close => client.close(ctx).await,
        Command::Eval => client.eval(ctx, "noop", &[], &[]).await.map(drop),
        Command::LPop => client.lpop(ctx, "l").await.map(drop),
        Command::RPop => client.rpop(ctx, "l").await.map(drop),
        Command::LPush => client.lpush(ctx, "l", vec![Bytes::from_static(b"a")]).await.map(drop),
        Command::RPush => client.rpush(ctx, "l", vec![Bytes::from_static(b"a")]).await.map(drop),
        Command::HSet => client.hset(ctx, "h", "f", Bytes::from_static(b"v")).await.map(drop),
        Command::HGet => client.hget(ctx, "h", "f").await.map(drop),
        Command::HLen => client.hlen(ctx, "h").await.map(drop),
        Command::Expire => client.expire(ctx, "k", Duration::from_secs(30)).await.map(drop),
        Command::ExpireAt => {
            client.expire_at(ctx, "k", Utc::now() + TimeDelta::minutes(5)).await.map(drop)
        },
    }
}
