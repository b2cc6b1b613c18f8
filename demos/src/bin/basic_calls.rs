//! Basic instrumented calls.
//!
//! Wraps the in-memory store, issues a handful of commands under one parent
//! trace, and prints the collected call metrics.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=cachetrace=trace cargo run -p cachetrace-demos --bin basic_calls
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cachetrace::prelude::*;
use cachetrace::testing::InMemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Spans from the default backend show up as `tracing` spans
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let metrics = Metrics::default();
    let options = TraceOptions::builder()
        .instance_name("sessions")
        .commands(CommandToggles::ALL.with(Command::Ping, false))
        .build();
    let client = Instrumented::builder(InMemoryStore::new())
        .options(options)
        .recorder(Arc::new(metrics.clone()))
        .build();

    // Continue a trace propagated from an upstream service
    let ctx =
        CallContext::from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")?;

    println!("ping: {}", client.ping(&ctx).await?);

    let ttl = Some(Duration::from_secs(60));
    client.set(&ctx, "session:42", Bytes::from_static(b"alice"), ttl).await?;
    let session = client.get(&ctx, "session:42").await?;
    println!("session:42 = {session:?}");

    let visits = client.incr(&ctx, "visits").await?;
    println!("visits = {visits}");

    // Errors come back exactly as the store produced them
    if let Err(err) = client.incr(&ctx, "session:42").await {
        println!("incr on a string value failed: {err}");
    }

    let jobs = vec![Bytes::from_static(b"resize"), Bytes::from_static(b"encode")];
    client.rpush(&ctx, "jobs", jobs).await?;
    while let Some(job) = client.lpop(&ctx, "jobs").await? {
        println!("job: {}", String::from_utf8_lossy(&job));
    }

    client.close(&ctx).await?;

    println!("\nCall metrics:");
    for stats in metrics.snapshot().calls {
        println!(
            "  {:<12} {:<10} calls={} errors={} abandoned={} avg={:?}",
            stats.operation,
            stats.instance,
            stats.calls,
            stats.errors,
            stats.abandoned,
            stats.latency_avg(),
        );
    }

    Ok(())
}
