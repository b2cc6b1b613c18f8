//! Concurrent calls through one shared instrumented client.
//!
//! Each task continues its own trace; a few calls are cut short by a timeout
//! to show how abandoned calls are reported.
//!
//! # Running
//!
//! ```bash
//! cargo run -p cachetrace-demos --bin concurrent_calls
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cachetrace::prelude::*;
use cachetrace::testing::InMemoryStore;
use cachetrace::tracing_support::TraceContext;
use futures::future::join_all;
use tracing_subscriber::EnvFilter;

const TASKS: usize = 50;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let store = InMemoryStore::new();
    let metrics = Metrics::default();
    let client = Arc::new(
        Instrumented::builder(store.clone())
            .options(TraceOptions::all())
            .recorder(Arc::new(metrics.clone()))
            .build(),
    );

    // Every tenth write hangs until the caller gives up on it
    for _ in 0..TASKS / 10 {
        store.hang_next(Command::HSet);
    }

    let tasks = (0..TASKS).map(|i| {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let ctx = CallContext::with_parent(TraceContext::new_root());
            let field = format!("user:{i}");
            let write = client.hset(&ctx, "users", &field, Bytes::from(i.to_string()));
            tokio::time::timeout(Duration::from_millis(50), write).await.is_ok()
        })
    });

    let mut completed = 0;
    for finished in join_all(tasks).await {
        if finished? {
            completed += 1;
        }
    }
    println!("{completed}/{TASKS} writes completed");

    let ctx = CallContext::background();
    println!("users hash holds {} fields", client.hlen(&ctx, "users").await?);

    let snapshot = metrics.snapshot();
    println!(
        "calls={} errors={} abandoned={}",
        snapshot.total_calls(),
        snapshot.total_errors(),
        snapshot.total_abandoned()
    );

    Ok(())
}
