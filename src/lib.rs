//! # keyward
//!
//! Change-triggered dispatch: run registered executors whenever a watched key
//! changes in a key/value store.
//!
//! ## Overview
//!
//! `keyward` is the "react to change" layer of a configuration or deployment
//! tool:
//! - Executors are bound to one or more watch keys at startup
//! - A single watch loop turns change notifications into executor runs
//! - Each run receives context freshly fetched from the store
//! - Executor failures are collected, never blocking sibling executors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyward::prelude::*;
//! use keyward::client::MemoryClient;
//! use std::sync::Arc;
//! use tokio::sync::oneshot;
//!
//! # async fn example() -> keyward::Result<()> {
//! let client = Arc::new(MemoryClient::new());
//!
//! let mut sentinel = Sentinel::new(client.clone());
//! sentinel.add(["web"], Arc::new(CommandExecutor::new("reload", "nginx").with_args(["-s", "reload"])));
//! sentinel.add(["web", "db"], Arc::new(FnExecutor::new("audit", |context| {
//!     println!("changed: {:?}", context);
//!     Ok(())
//! })));
//!
//! // Watch for changes in the background
//! let sentinel = Arc::new(sentinel);
//! let (stop, stop_rx) = oneshot::channel();
//! let worker = tokio::spawn({
//!     let sentinel = Arc::clone(&sentinel);
//!     async move { sentinel.run(stop_rx).await }
//! });
//!
//! // Or run executors on demand
//! sentinel.execute(&["audit"]).await?;
//!
//! let _ = stop.send(());
//! worker.await.expect("dispatcher panicked")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): [`client::FileClient`], a directory tree store
//!   driven by filesystem notifications
//! - `metrics`: OpenTelemetry dispatch metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod client;
pub mod context;
pub mod core;
pub mod error;
pub mod executor;
pub mod settings;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use context::Context;
pub use error::{DispatchErrors, ExecutorError, Result, SentinelError};
pub use executor::{CommandExecutor, Executor, FnExecutor};

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::context::Context;
    pub use crate::core::{Registry, Sentinel};
    pub use crate::error::{DispatchErrors, ExecutorError, Result, SentinelError};
    pub use crate::executor::{CommandExecutor, Executor, FnExecutor};
    pub use crate::settings::Settings;
}
