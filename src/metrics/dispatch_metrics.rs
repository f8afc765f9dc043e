//! Dispatch metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for dispatch operations.
///
/// Tracks change notifications, executor outcomes, fetch failures and
/// per-key dispatch latency using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use keyward::metrics::DispatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("keyward");
/// let metrics = DispatchMetrics::new(meter);
///
/// let timer = metrics.start_dispatch();
/// // ... run executors ...
/// metrics.record_dispatch(timer, 0);
/// ```
#[derive(Clone)]
pub struct DispatchMetrics {
    notifications: Counter<u64>,
    executions: Counter<u64>,
    executor_failures: Counter<u64>,
    fetch_failures: Counter<u64>,
    dispatch_duration: Histogram<f64>,
}

impl DispatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let notifications = meter
            .u64_counter("keyward.notifications")
            .with_description("Number of change notifications received")
            .build();

        let executions = meter
            .u64_counter("keyward.executions")
            .with_description("Number of executor invocations")
            .build();

        let executor_failures = meter
            .u64_counter("keyward.executions.failures")
            .with_description("Number of failed executor invocations")
            .build();

        let fetch_failures = meter
            .u64_counter("keyward.fetch.failures")
            .with_description("Number of context fetches that failed")
            .build();

        let dispatch_duration = meter
            .f64_histogram("keyward.dispatch.duration")
            .with_description("Duration of per-key dispatches in seconds")
            .with_unit("s")
            .build();

        Self {
            notifications,
            executions,
            executor_failures,
            fetch_failures,
            dispatch_duration,
        }
    }

    /// Record a change notification taken off the stream.
    pub fn record_notification(&self) {
        self.notifications.add(1, &[]);
    }

    /// Start timing a per-key dispatch.
    ///
    /// Pass the returned `Instant` to [`record_dispatch`](Self::record_dispatch).
    pub fn start_dispatch(&self) -> Instant {
        Instant::now()
    }

    /// Record a completed dispatch and how many failures it produced.
    pub fn record_dispatch(&self, start: Instant, failures: usize) {
        let outcome = if failures == 0 { "success" } else { "failure" };
        self.dispatch_duration.record(
            start.elapsed().as_secs_f64(),
            &[KeyValue::new("outcome", outcome)],
        );
    }

    /// Record one executor invocation.
    pub fn record_execution(&self, success: bool) {
        self.executions.add(1, &[]);
        if !success {
            self.executor_failures.add(1, &[]);
        }
    }

    /// Record a failed context fetch.
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.add(1, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::core::Sentinel;
    use crate::executor::FnExecutor;
    use opentelemetry::global;
    use std::sync::Arc;

    #[test]
    fn test_metrics_operations() {
        let metrics = DispatchMetrics::new(global::meter("test"));

        // Test basic operations don't panic
        metrics.record_notification();
        let timer = metrics.start_dispatch();
        metrics.record_execution(true);
        metrics.record_execution(false);
        metrics.record_dispatch(timer, 1);
        metrics.record_fetch_failure();
    }

    #[tokio::test]
    async fn test_sentinel_with_metrics() {
        let mut sentinel = Sentinel::new(Arc::new(MemoryClient::new()))
            .with_metrics(DispatchMetrics::new(global::meter("test")));
        sentinel.add(["k"], Arc::new(FnExecutor::new("fail", |_| Err("x".into()))));

        assert_eq!(sentinel.execute_key("k").await.len(), 1);
        assert!(sentinel.execute(&["fail"]).await.is_err());
    }
}
