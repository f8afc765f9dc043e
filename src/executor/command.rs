//! Executor that runs an external command.

use super::Executor;
use crate::context::Context;
use crate::error::ExecutorError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Executor that spawns a program for every invocation.
///
/// When a context is supplied it is serialized as JSON and written to the
/// child's stdin; otherwise stdin is empty. A non-zero exit status is
/// reported as an error carrying the captured stderr.
///
/// # Examples
///
/// ```rust
/// use keyward::CommandExecutor;
///
/// let executor = CommandExecutor::new("reload-nginx", "nginx")
///     .with_args(["-s", "reload"]);
/// ```
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Create a new command executor.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique executor name
    /// * `program` - Program to spawn (resolved through `PATH`)
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Set the arguments passed to the program.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The program this executor spawns.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: Option<&Context>) -> Result<(), ExecutorError> {
        debug!(executor = %self.name, program = %self.program, "spawning command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(if context.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to spawn '{}': {}", self.program, e))?;

        if let (Some(context), Some(mut stdin)) = (context, child.stdin.take()) {
            let payload = serde_json::to_vec(context)?;
            // The child may exit without reading its input.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            // Closing stdin lets the child see EOF.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "'{}' exited with {}: {}",
            self.program,
            output.status,
            stderr.trim()
        )
        .into())
    }
}
