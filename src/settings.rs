//! Layered dispatcher settings.
//!
//! Settings are read from an optional file (YAML, TOML or JSON, detected from
//! the extension) and then overridden by environment variables, e.g.
//! `KEYWARD_NAMESPACE=deploy` or `KEYWARD_DEBOUNCE_MS=250` for the prefix
//! `KEYWARD`.
//!
//! ```yaml
//! namespace: deploy
//! debounce_ms: 250
//! commands:
//!   - name: reload-nginx
//!     keys: [web, certs]
//!     program: nginx
//!     args: ["-s", "reload"]
//! ```

use crate::core::{DEFAULT_NAMESPACE, Sentinel};
use crate::error::{Result, SentinelError};
use crate::executor::CommandExecutor;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Top-level path segment under which key contexts are fetched.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Debounce window for file-backed clients, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Commands to run when their keys change.
    #[serde(default)]
    pub commands: Vec<CommandSettings>,
}

/// A command bound to one or more watch keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandSettings {
    /// Unique executor name.
    pub name: String,

    /// Keys that trigger the command.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Program to spawn.
    pub program: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            debounce_ms: default_debounce_ms(),
            commands: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) overridden by environment
    /// variables starting with `env_prefix`.
    ///
    /// The prefix is followed by `_`; nested keys use `__` as separator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or if a command
    /// has an empty name or program.
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| SentinelError::LoadError(format!("Failed to load settings: {}", e)))?
            .try_deserialize()
            .map_err(|e| SentinelError::ParseError(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        debug!(
            namespace = %settings.namespace,
            commands = settings.commands.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// The debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Register every configured command with `sentinel`.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::DuplicateExecutor`] if a command name is
    /// already registered.
    pub fn register(&self, sentinel: &mut Sentinel) -> Result<()> {
        for command in &self.commands {
            let executor =
                CommandExecutor::new(command.name.clone(), command.program.clone())
                    .with_args(command.args.iter().cloned());
            sentinel.try_add(command.keys.iter().cloned(), Arc::new(executor))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for command in &self.commands {
            if command.name.trim().is_empty() {
                return Err(SentinelError::ParseError(
                    "command name must not be empty".to_string(),
                ));
            }
            if command.program.trim().is_empty() {
                return Err(SentinelError::ParseError(format!(
                    "command '{}' has an empty program",
                    command.name
                )));
            }
        }
        Ok(())
    }
}
