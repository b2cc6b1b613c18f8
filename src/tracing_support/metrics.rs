//! Per-call metrics recording.
//!
//! Every instrumented call asks a [`MetricsRecorder`] for a [`CallRecord`]
//! before it delegates, and finishes that record with the call's outcome
//! afterwards. A record dropped without being finished reports
//! [`CallStatus::Abandoned`], so every call is counted exactly once.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::tracing_support::CallContext;
use crate::types::{CallOutcome, CallStatus};

/// Records one call per invocation.
///
/// `operation` is the command's metric name (e.g. `redis.get`) and
/// `instance` the configured instance label.
pub trait MetricsRecorder: Send + Sync {
    /// Starts recording a call. The returned record must be finished with
    /// the call's outcome.
    fn record_call(&self, ctx: &CallContext, operation: &str, instance: &str) -> CallRecord;
}

impl<R: MetricsRecorder + ?Sized> MetricsRecorder for Arc<R> {
    fn record_call(&self, ctx: &CallContext, operation: &str, instance: &str) -> CallRecord {
        (**self).record_call(ctx, operation, instance)
    }
}

/// Completes a call record with the call's outcome.
pub trait CallFinalizer: Send {
    /// Reports the outcome. Called at most once.
    fn finish(self: Box<Self>, outcome: &CallOutcome<'_>);
}

impl<F> CallFinalizer for F
where
    F: FnOnce(&CallOutcome<'_>) + Send,
{
    fn finish(self: Box<Self>, outcome: &CallOutcome<'_>) {
        (*self)(outcome)
    }
}

/// The pending metrics record of one call.
#[must_use = "an unfinished record is reported as abandoned"]
pub struct CallRecord {
    finalizer: Option<Box<dyn CallFinalizer>>,
}

impl CallRecord {
    /// Creates a record completed by `finalizer`.
    pub fn new(finalizer: impl CallFinalizer + 'static) -> Self {
        Self { finalizer: Some(Box::new(finalizer)) }
    }

    /// A record that reports nothing.
    pub fn noop() -> Self {
        Self { finalizer: None }
    }

    /// Reports the call's outcome.
    pub fn finish(mut self, outcome: &CallOutcome<'_>) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(outcome);
        }
    }
}

impl Drop for CallRecord {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(&CallOutcome::abandoned());
        }
    }
}

impl fmt::Debug for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord").field("pending", &self.finalizer.is_some()).finish()
    }
}

/// A recorder that discards every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn record_call(&self, _ctx: &CallContext, _operation: &str, _instance: &str) -> CallRecord {
        CallRecord::noop()
    }
}

/// Configuration for the built-in recorders.
///
/// ## Example
///
/// ```rust
/// use cachetrace::tracing_support::MetricsConfig;
///
/// let config = MetricsConfig::builder().prefix("sessions").track_latency(false).build();
/// assert_eq!(config.prefix, "sessions");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix for metric names emitted through the `metrics` facade.
    #[builder(into, default = "cachetrace".to_string())]
    pub prefix: String,
    /// Whether call latency is measured.
    #[builder(default = true)]
    pub track_latency: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    calls: AtomicU64,
    errors: AtomicU64,
    abandoned: AtomicU64,
    latency_sum_ns: AtomicU64,
    latency_count: AtomicU64,
}

impl CallCounters {
    fn record(&self, status: CallStatus, latency: Option<Duration>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match status {
            CallStatus::Ok => {},
            CallStatus::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            },
            CallStatus::Abandoned => {
                self.abandoned.fetch_add(1, Ordering::Relaxed);
            },
        }
        if let Some(latency) = latency {
            let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
            self.latency_sum_ns.fetch_add(nanos, Ordering::Relaxed);
            self.latency_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl CallCounters {
    fn reset(&self) {
        for counter in
            [&self.calls, &self.errors, &self.abandoned, &self.latency_sum_ns, &self.latency_count]
        {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

type CounterKey = (String, String);

/// An in-process metrics collector keyed by operation and instance.
///
/// Cloning is cheap; clones share the same counters.
///
/// ## Example
///
/// ```rust
/// use cachetrace::{CallContext, CallOutcome};
/// use cachetrace::tracing_support::{Metrics, MetricsRecorder};
///
/// let metrics = Metrics::default();
/// metrics
///     .record_call(&CallContext::background(), "redis.get", "default")
///     .finish(&CallOutcome::ok());
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.total_calls(), 1);
/// assert_eq!(snapshot.get("redis.get", "default").map(|s| s.calls), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    config: MetricsConfig,
    counters: RwLock<HashMap<CounterKey, Arc<CallCounters>>>,
}

impl Metrics {
    /// Creates a collector with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { inner: Arc::new(MetricsInner { config, counters: RwLock::new(HashMap::new()) }) }
    }

    /// Returns the collector's configuration.
    pub fn config(&self) -> &MetricsConfig {
        &self.inner.config
    }

    fn counters(&self, operation: &str, instance: &str) -> Arc<CallCounters> {
        let key = (operation.to_string(), instance.to_string());
        if let Some(counters) = self.inner.counters.read().get(&key) {
            return Arc::clone(counters);
        }
        Arc::clone(self.inner.counters.write().entry(key).or_default())
    }

    /// Returns a snapshot of every counter that has recorded a call, sorted
    /// by operation and instance.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.inner.counters.read();
        let mut calls: Vec<CallStats> = counters
            .iter()
            .filter(|(_, c)| c.calls.load(Ordering::Relaxed) > 0)
            .map(|((operation, instance), c)| {
                let count = c.latency_count.load(Ordering::Relaxed);
                let sum = c.latency_sum_ns.load(Ordering::Relaxed);
                CallStats {
                    operation: operation.clone(),
                    instance: instance.clone(),
                    calls: c.calls.load(Ordering::Relaxed),
                    errors: c.errors.load(Ordering::Relaxed),
                    abandoned: c.abandoned.load(Ordering::Relaxed),
                    latency_avg_ns: if count > 0 { sum / count } else { 0 },
                }
            })
            .collect();
        calls.sort_by(|a, b| (&a.operation, &a.instance).cmp(&(&b.operation, &b.instance)));
        MetricsSnapshot { calls }
    }

    /// Zeroes every counter.
    ///
    /// Counters are reset in place, so calls already in flight are still
    /// counted when they finish.
    pub fn reset(&self) {
        for counters in self.inner.counters.read().values() {
            counters.reset();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl MetricsRecorder for Metrics {
    fn record_call(&self, _ctx: &CallContext, operation: &str, instance: &str) -> CallRecord {
        let counters = self.counters(operation, instance);
        let start = self.inner.config.track_latency.then(Instant::now);
        CallRecord::new(move |outcome: &CallOutcome<'_>| {
            counters.record(outcome.status(), start.map(|s| s.elapsed()));
        })
    }
}

/// Counters for one `(operation, instance)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    /// Metric operation name.
    pub operation: String,
    /// Instance label.
    pub instance: String,
    /// Recorded calls, whatever their outcome.
    pub calls: u64,
    /// Calls that returned an error.
    pub errors: u64,
    /// Calls that never completed.
    pub abandoned: u64,
    /// Average latency in nanoseconds.
    pub latency_avg_ns: u64,
}

impl CallStats {
    /// Returns the average latency as a Duration.
    pub fn latency_avg(&self) -> Duration {
        Duration::from_nanos(self.latency_avg_ns)
    }

    /// Returns the error rate (0.0 - 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.errors as f64 / self.calls as f64
    }
}

/// A snapshot of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Per-operation counters.
    pub calls: Vec<CallStats>,
}

impl MetricsSnapshot {
    /// Returns the counters for one operation and instance.
    pub fn get(&self, operation: &str, instance: &str) -> Option<&CallStats> {
        self.calls.iter().find(|s| s.operation == operation && s.instance == instance)
    }

    /// Returns the number of calls across all operations.
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|s| s.calls).sum()
    }

    /// Returns the number of failed calls across all operations.
    pub fn total_errors(&self) -> u64 {
        self.calls.iter().map(|s| s.errors).sum()
    }

    /// Returns the number of abandoned calls across all operations.
    pub fn total_abandoned(&self) -> u64 {
        self.calls.iter().map(|s| s.abandoned).sum()
    }
}

/// A recorder that reports through the [`metrics`](::metrics) facade.
///
/// Each call increments `<prefix>_calls_total` labelled with `operation`,
/// `instance` and `status`, and records `<prefix>_call_duration_seconds`
/// when latency tracking is on. Install any `metrics` exporter to collect
/// them.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct FacadeRecorder {
    calls_total: String,
    duration_seconds: String,
    track_latency: bool,
}

#[cfg(feature = "metrics")]
impl FacadeRecorder {
    /// Creates a facade recorder.
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            calls_total: format!("{}_calls_total", config.prefix),
            duration_seconds: format!("{}_call_duration_seconds", config.prefix),
            track_latency: config.track_latency,
        }
    }
}

#[cfg(feature = "metrics")]
impl Default for FacadeRecorder {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

#[cfg(feature = "metrics")]
impl MetricsRecorder for FacadeRecorder {
    fn record_call(&self, _ctx: &CallContext, operation: &str, instance: &str) -> CallRecord {
        let recorder = self.clone();
        let operation = operation.to_string();
        let instance = instance.to_string();
        let start = Instant::now();

        CallRecord::new(move |outcome: &CallOutcome<'_>| {
            if recorder.track_latency {
                ::metrics::histogram!(
                    recorder.duration_seconds.clone(),
                    "operation" => operation.clone(),
                    "instance" => instance.clone()
                )
                .record(start.elapsed().as_secs_f64());
            }
            ::metrics::counter!(
                recorder.calls_total,
                "operation" => operation,
                "instance" => instance,
                "status" => outcome.status().as_str()
            )
            .increment(1);
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn ctx() -> CallContext {
        CallContext::background()
    }

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert_eq!(config.prefix, "cachetrace");
        assert!(config.track_latency);
    }

    #[test]
    fn test_metrics_config_deserialize_partial() {
        let config: MetricsConfig = serde_json::from_str(r#"{"prefix": "app"}"#).unwrap();
        assert_eq!(config.prefix, "app");
        assert!(config.track_latency);
    }

    #[test]
    fn test_record_finish_runs_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let record = CallRecord::new(move |outcome: &CallOutcome<'_>| {
            assert_eq!(outcome.status(), CallStatus::Ok);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        record.finish(&CallOutcome::ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_record_is_abandoned() {
        let status = Arc::new(parking_lot::Mutex::new(None));
        let seen = Arc::clone(&status);
        let record = CallRecord::new(move |outcome: &CallOutcome<'_>| {
            *seen.lock() = Some(outcome.status());
        });
        drop(record);
        assert_eq!(*status.lock(), Some(CallStatus::Abandoned));
    }

    #[test]
    fn test_metrics_counts_outcomes() {
        let metrics = Metrics::default();
        let err = std::io::Error::other("boom");

        metrics.record_call(&ctx(), "redis.get", "cache1").finish(&CallOutcome::ok());
        metrics.record_call(&ctx(), "redis.get", "cache1").finish(&CallOutcome::failed(&err));
        drop(metrics.record_call(&ctx(), "redis.get", "cache1"));
        metrics.record_call(&ctx(), "redis.set", "cache1").finish(&CallOutcome::ok());

        let snapshot = metrics.snapshot();
        let get = snapshot.get("redis.get", "cache1").unwrap();
        assert_eq!((get.calls, get.errors, get.abandoned), (3, 1, 1));
        assert_eq!(snapshot.total_calls(), 4);
        assert_eq!(snapshot.total_errors(), 1);
        assert_eq!(snapshot.total_abandoned(), 1);
        assert!((get.error_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_separates_instances() {
        let metrics = Metrics::default();
        metrics.record_call(&ctx(), "redis.get", "a").finish(&CallOutcome::ok());
        metrics.record_call(&ctx(), "redis.get", "b").finish(&CallOutcome::ok());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls.len(), 2);
        assert_eq!(snapshot.calls[0].instance, "a");
        assert_eq!(snapshot.calls[1].instance, "b");
    }

    #[test]
    fn test_metrics_without_latency() {
        let metrics = Metrics::new(MetricsConfig::builder().track_latency(false).build());
        metrics.record_call(&ctx(), "redis.ping", "default").finish(&CallOutcome::ok());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.get("redis.ping", "default").unwrap().latency_avg(), Duration::ZERO);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::default();
        metrics.record_call(&ctx(), "redis.del", "default").finish(&CallOutcome::ok());
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_reset_keeps_in_flight_calls() {
        let metrics = Metrics::default();
        metrics.record_call(&ctx(), "redis.get", "default").finish(&CallOutcome::ok());

        let pending = metrics.record_call(&ctx(), "redis.get", "default");
        metrics.reset();
        pending.finish(&CallOutcome::ok());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_calls(), 1);
        assert_eq!(snapshot.get("redis.get", "default").map(|s| s.calls), Some(1));
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::default();
        let clone = metrics.clone();
        clone.record_call(&ctx(), "redis.incr", "default").finish(&CallOutcome::ok());
        assert_eq!(metrics.snapshot().total_calls(), 1);
    }

    #[test]
    fn test_noop_recorder() {
        NoopRecorder.record_call(&ctx(), "redis.get", "default").finish(&CallOutcome::ok());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_facade_recorder_without_exporter() {
        let recorder = FacadeRecorder::default();
        recorder.record_call(&ctx(), "redis.get", "default").finish(&CallOutcome::ok());
        drop(recorder.record_call(&ctx(), "redis.get", "default"));
    }
}
