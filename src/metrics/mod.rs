//! Built-in metrics for dispatch activity.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Change notifications received
//! - Executor invocations and failures
//! - Context fetch failures
//! - Dispatch duration
//!
//! # Examples
//!
//! ```rust,no_run
//! use keyward::prelude::*;
//! use keyward::client::MemoryClient;
//! use keyward::metrics::DispatchMetrics;
//! use opentelemetry::global;
//! use std::sync::Arc;
//!
//! let meter = global::meter("my-app");
//! let sentinel = Sentinel::new(Arc::new(MemoryClient::new()))
//!     .with_metrics(DispatchMetrics::new(meter));
//! ```

mod dispatch_metrics;

pub use dispatch_metrics::DispatchMetrics;
