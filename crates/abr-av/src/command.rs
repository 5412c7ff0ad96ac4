//! Builder for executing external tool commands with timeout and
//! cancellation support.
//!
//! Output pipes are drained on their own tasks while the process is awaited,
//! so a chatty encoder can never block on a full stderr pipe.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Why a tool invocation did not produce an exit status.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("I/O error waiting for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<CommandError> for abr_core::Error {
    fn from(err: CommandError) -> Self {
        let tool = match &err {
            CommandError::Spawn { tool, .. }
            | CommandError::TimedOut { tool, .. }
            | CommandError::Cancelled { tool }
            | CommandError::Wait { tool, .. } => tool.clone(),
        };
        abr_core::Error::tool(tool, err.to_string())
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use abr_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> abr_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_streams")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Kill the process when `token` is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// The arguments added so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the process to completion and return its output, whatever the
    /// exit status.
    ///
    /// The process is killed when the timeout elapses or the cancellation
    /// token fires.
    pub async fn run(&self) -> Result<ToolOutput, CommandError> {
        let tool = self.program_name();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        let cancel = self.cancel.clone().unwrap_or_default();
        let waited = tokio::select! {
            res = child.wait() => Waited::Exited(res),
            _ = tokio::time::sleep(self.timeout) => Waited::TimedOut,
            _ = cancel.cancelled() => Waited::Cancelled,
        };

        let status = match waited {
            Waited::Exited(Ok(status)) => status,
            Waited::Exited(Err(source)) => {
                kill(&mut child, &tool).await;
                return Err(CommandError::Wait { tool, source });
            }
            Waited::TimedOut => {
                tracing::warn!(tool = %tool, timeout = ?self.timeout, "Tool timed out, killing process");
                kill(&mut child, &tool).await;
                return Err(CommandError::TimedOut {
                    tool,
                    timeout: self.timeout,
                });
            }
            Waited::Cancelled => {
                tracing::info!(tool = %tool, "Tool cancelled, killing process");
                kill(&mut child, &tool).await;
                return Err(CommandError::Cancelled { tool });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`abr_core::Error::Tool`] if spawning fails, the process
    /// times out or is cancelled, or it exits with a non-zero status
    /// (message includes stderr).
    pub async fn execute(&self) -> abr_core::Result<ToolOutput> {
        let output = self.run().await?;

        if !output.status.success() {
            return Err(abr_core::Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(output)
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

async fn kill(child: &mut Child, tool: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(tool = %tool, error = %e, "Failed to kill process");
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}
