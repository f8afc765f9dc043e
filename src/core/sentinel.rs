//! The dispatcher tying a client to registered executors.

use crate::client::Client;
use crate::context::Context;
use crate::core::registry::{ExecutorRef, Registry};
use crate::error::{DispatchErrors, Result, SentinelError};
use crate::settings::Settings;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;

/// Top-level path segment under which key contexts are fetched by default.
pub const DEFAULT_NAMESPACE: &str = "sentinel";

/// Change-triggered dispatcher.
///
/// Executors are bound to watch keys with [`add`](Self::add). While
/// [`run`](Self::run) is active, every key reported by the client triggers
/// all executors subscribed to it, each receiving the context fetched from
/// `[namespace, key]`. [`execute`](Self::execute) runs executors by name on
/// demand, without context.
///
/// Executors for one change run sequentially in registration order. A
/// failing executor never prevents the others from running; failures are
/// collected into [`DispatchErrors`].
///
/// # Examples
///
/// ```rust,no_run
/// use keyward::prelude::*;
/// use keyward::client::MemoryClient;
/// use std::sync::Arc;
/// use tokio::sync::oneshot;
///
/// # async fn example() -> Result<()> {
/// let client = Arc::new(MemoryClient::new());
/// let mut sentinel = Sentinel::new(client.clone());
/// sentinel.add(["web"], Arc::new(FnExecutor::new("reload", |context| {
///     println!("web changed: {:?}", context);
///     Ok(())
/// })));
///
/// let sentinel = Arc::new(sentinel);
/// let (stop_tx, stop_rx) = oneshot::channel();
/// let worker = tokio::spawn({
///     let sentinel = Arc::clone(&sentinel);
///     async move { sentinel.run(stop_rx).await }
/// });
///
/// client.set(&["sentinel", "web"], serde_json::json!({ "port": 80 }))?;
///
/// let _ = stop_tx.send(());
/// worker.await.expect("dispatcher panicked")?;
/// # Ok(())
/// # }
/// ```
pub struct Sentinel {
    client: Arc<dyn Client>,
    registry: Registry,
    namespace: String,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl Sentinel {
    /// Create a dispatcher for `client` with an empty registry.
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            client,
            registry: Registry::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Create a dispatcher configured from `settings`, with every configured
    /// command registered.
    ///
    /// # Errors
    ///
    /// Returns an error if two commands share a name.
    pub fn from_settings(client: Arc<dyn Client>, settings: &Settings) -> Result<Self> {
        let mut sentinel = Self::new(client).with_namespace(settings.namespace.clone());
        settings.register(&mut sentinel)?;
        Ok(sentinel)
    }

    /// Set the namespace prepended to every key when fetching context.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Record dispatch activity through `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register `executor` under every key in `keys`.
    ///
    /// See [`Registry::add`].
    pub fn add<I, K>(&mut self, keys: I, executor: ExecutorRef)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.registry.add(keys, executor);
    }

    /// Register `executor`, rejecting names bound to a different executor.
    ///
    /// See [`Registry::try_add`].
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::DuplicateExecutor`] on a name collision.
    pub fn try_add<I, K>(&mut self, keys: I, executor: ExecutorRef) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.registry.try_add(keys, executor)
    }

    /// The executor registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The namespace used when fetching context.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run every executor subscribed to `key` with freshly fetched context.
    ///
    /// Keys without subscribers are a no-op and nothing is fetched. A missing
    /// value is passed as an empty context. If the fetch fails, a single
    /// [`SentinelError::Fetch`] is returned and no executor runs. Otherwise
    /// every subscriber runs in registration order and each failure is
    /// recorded in that order.
    pub async fn execute_key(&self, key: &str) -> DispatchErrors {
        let mut errors = DispatchErrors::new();
        let subscribers = self.registry.subscribers(key);
        if subscribers.is_empty() {
            debug!(key, "no executors subscribed");
            return errors;
        }

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(DispatchMetrics::start_dispatch);

        let path = [self.namespace.as_str(), key];
        let context = match self.client.fetch(&path).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                debug!(key, "no value stored, dispatching empty context");
                Context::new()
            }
            Err(e) => {
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_fetch_failure();
                }
                errors.push(SentinelError::Fetch {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
                return errors;
            }
        };

        debug!(key, subscribers = subscribers.len(), "dispatching change");
        for executor in subscribers {
            self.invoke(executor, Some(&context), &mut errors).await;
        }

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_dispatch(timer, errors.len());
        }

        errors
    }

    /// Run the named executors once, without context.
    ///
    /// Every name is resolved before anything runs: if any name is unknown,
    /// nothing is invoked and the error lists every unknown name. Duplicate
    /// names run the executor once per occurrence. An empty list succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Dispatch`] if a name is unknown or any
    /// executor fails.
    pub async fn execute<S>(&self, names: &[S]) -> Result<()>
    where
        S: AsRef<str> + Sync,
    {
        self.execute_report(names).await.into_result()
    }

    /// Like [`execute`](Self::execute), returning the individual failures.
    pub async fn execute_report<S>(&self, names: &[S]) -> DispatchErrors
    where
        S: AsRef<str> + Sync,
    {
        let mut errors = DispatchErrors::new();
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.registry.get(name.as_ref()) {
                Some(executor) => resolved.push(executor),
                None => errors.push(SentinelError::UnknownExecutor(name.as_ref().to_string())),
            }
        }
        if errors.has_failures() {
            return errors;
        }

        for executor in resolved {
            self.invoke(executor, None, &mut errors).await;
        }
        errors
    }

    /// Run every registered executor once, in name order, without context.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Dispatch`] if any executor fails.
    pub async fn execute_all(&self) -> Result<()> {
        self.execute_all_report().await.into_result()
    }

    /// Like [`execute_all`](Self::execute_all), returning the individual
    /// failures.
    pub async fn execute_all_report(&self) -> DispatchErrors {
        let names = self.registry.names();
        debug!(executors = names.len(), "executing all");
        self.execute_report(names.as_slice()).await
    }

    /// Dispatch changes from the client until stopped.
    ///
    /// The loop ends when `stop` receives a value or its sender is dropped,
    /// or when the client's change stream closes. Changes are handled one at
    /// a time in arrival order; executor failures are logged and never end
    /// the loop. When a stop signal and a change are ready together, the
    /// stop signal wins.
    ///
    /// # Errors
    ///
    /// Returns an error only if the change stream cannot be started.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) -> Result<()> {
        let mut changes = self.client.watch()?;
        info!(
            client = %self.client.name(),
            namespace = %self.namespace,
            keys = self.registry.keys().len(),
            "dispatcher started"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut stop => {
                    info!("stop signal received, dispatcher exiting");
                    break;
                }
                change = changes.recv() => match change {
                    Some(key) => {
                        #[cfg(feature = "metrics")]
                        if let Some(metrics) = &self.metrics {
                            metrics.record_notification();
                        }
                        let errors = self.execute_key(&key).await;
                        for err in &errors {
                            error!(key = %key, error = %err, "dispatch failed");
                        }
                    }
                    None => {
                        warn!("change stream closed, dispatcher exiting");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    async fn invoke(
        &self,
        executor: &ExecutorRef,
        context: Option<&Context>,
        errors: &mut DispatchErrors,
    ) {
        let outcome = executor.execute(context).await;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_execution(outcome.is_ok());
        }

        if let Err(source) = outcome {
            errors.push(SentinelError::ExecutorFailed {
                name: executor.name().to_string(),
                source,
            });
        }
    }
}

impl std::fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sentinel")
            .field("client", &self.client.name())
            .field("namespace", &self.namespace)
            .field("registry", &self.registry)
            .finish()
    }
}
