//! Command executor - subprocess lifecycle and outcome reporting
//!
//! One call to [`CommandExecutor::execute`] owns one subprocess from spawn to
//! reap. Output is forwarded by two concurrent drains; the deadline and the
//! session cancellation token both end in a process-group kill. Every
//! failure is reported through the sink as a `system` chunk, never returned.

mod process;


use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::command::CommandLine;
use crate::config::{ExecConfig, OutputMode};
use crate::drain::drain;
use crate::error::Error;
use crate::launcher::{launcher_for, Launcher};
use crate::protocol::{OutputChunk, StreamTag};
use crate::sink::{CollectSink, OutputSink};

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Blank command, nothing ran
    Skipped,
    /// Process exited on its own
    Exited {
        /// Exit code, -1 when killed by a signal
        code: i32,
    },
    /// Deadline exceeded, process killed
    TimedOut,
    /// Executable not found
    NotFound,
    /// Spawn failed for another reason
    StartFailed,
    /// Output pipes could not be captured
    PipeFailed,
    /// Waiting on the process failed
    WaitFailed,
    /// Session went away, process killed, nothing reported
    Cancelled,
}

impl Outcome {
    /// Exited with status zero
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 })
    }
}

enum Waited {
    Exited(std::process::ExitStatus),
    Failed(std::io::Error),
    TimedOut,
    Cancelled,
}

/// Runs command lines as subprocesses and streams their output
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ExecConfig,
    launcher: Arc<dyn Launcher>,
}

impl CommandExecutor {
    /// Executor using the launcher selected by `config.policy`
    #[must_use]
    pub fn new(config: ExecConfig) -> Self {
        let launcher = launcher_for(config.policy);
        Self::with_launcher(config, launcher)
    }

    /// Executor with an explicit launcher
    #[must_use]
    pub fn with_launcher(config: ExecConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self { config, launcher }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Execute `command`, delivering everything it produces to `sink`.
    ///
    /// In streaming mode the last chunk is always the completion marker,
    /// unless `cancel` fired. In combined mode exactly one chunk is delivered, empty
    /// when the command produced nothing.
    pub async fn execute(
        &self,
        command: &str,
        sink: Arc<dyn OutputSink>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let Some(line) = CommandLine::parse(command) else {
            debug!("Ignoring empty command");
            return Outcome::Skipped;
        };

        match self.config.output_mode {
            OutputMode::Streaming => {
                let outcome = self.run(&line, sink.clone(), cancel).await;
                if outcome != Outcome::Cancelled {
                    deliver(&sink, OutputChunk::complete()).await;
                }
                outcome
            }
            OutputMode::Combined => {
                let collector = Arc::new(CollectSink::new());
                let outcome = self.run(&line, collector.clone(), cancel).await;
                if outcome != Outcome::Cancelled {
                    deliver(&sink, combine(collector.take().await)).await;
                }
                outcome
            }
        }
    }

    async fn run(
        &self,
        line: &CommandLine,
        sink: Arc<dyn OutputSink>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let started = Instant::now();
        info!(command = %line, launcher = self.launcher.name(), "Executing command");

        let invocation = match self.launcher.resolve(line) {
            Ok(invocation) => invocation,
            Err(Error::NotFound(name)) => {
                info!(command = %line, program = %name, "Command not found");
                report(&sink, format!("command '{}' not found", name)).await;
                return Outcome::NotFound;
            }
            Err(e) => {
                warn!(command = %line, error = %e, "Failed to resolve command");
                report(&sink, format!("failed to start command '{}': {}", line, e)).await;
                return Outcome::StartFailed;
            }
        };

        let mut cmd = invocation.to_command();
        process::prepare(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(command = %line, program = %invocation.program, "Command not found");
                report(&sink, format!("command '{}' not found", invocation.program)).await;
                return Outcome::NotFound;
            }
            Err(e) => {
                let message = format!("failed to start command '{}': {}", line, e);
                let err = Error::Start(e);
                warn!(command = %line, error = %err, "Failed to spawn command");
                report(&sink, message).await;
                return Outcome::StartFailed;
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                process::terminate(&mut child).await;
                let e = Error::PipeSetup("stdout/stderr not captured".to_string());
                warn!(command = %line, error = %e, "Failed to capture output");
                report(&sink, format!("failed to capture output of '{}': {}", line, e)).await;
                return Outcome::PipeFailed;
            }
        };

        let chunk_size = self.config.chunk_size;
        let tracker = TaskTracker::new();
        let stdout_task = tracker.spawn(drain(stdout, StreamTag::Stdout, sink.clone(), chunk_size));
        let stderr_task = tracker.spawn(drain(stderr, StreamTag::Stderr, sink.clone(), chunk_size));
        tracker.close();

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => Waited::Cancelled,
            res = tokio::time::timeout(self.config.timeout(), async {
                tracker.wait().await;
                child.wait().await
            }) => match res {
                Ok(Ok(status)) => Waited::Exited(status),
                Ok(Err(e)) => Waited::Failed(e),
                Err(_) => Waited::TimedOut,
            },
        };

        let grace = self.config.kill_grace();
        let outcome = match waited {
            Waited::Exited(status) => {
                let bytes = process::drained_bytes([stdout_task, stderr_task]).await;
                let code = status.code().unwrap_or(-1);
                if status.success() {
                    if bytes == 0 {
                        report(&sink, format!("command '{}' executed successfully (no output)", line)).await;
                    }
                } else {
                    warn!(command = %line, exit_code = code, "Command exited with non-zero status");
                }
                Outcome::Exited { code }
            }
            Waited::TimedOut => {
                process::terminate(&mut child).await;
                process::settle(&tracker, [&stdout_task, &stderr_task], grace).await;
                let err = Error::DeadlineExceeded(self.config.timeout_secs);
                warn!(command = %line, error = %err, "Command timed out");
                report(
                    &sink,
                    format!("command '{}' timed out after {} seconds", line, self.config.timeout_secs),
                )
                .await;
                Outcome::TimedOut
            }
            Waited::Failed(e) => {
                process::terminate(&mut child).await;
                process::settle(&tracker, [&stdout_task, &stderr_task], grace).await;
                warn!(command = %line, error = %e, "Failed to wait for command");
                report(&sink, format!("command '{}' failed: {}", line, e)).await;
                Outcome::WaitFailed
            }
            Waited::Cancelled => {
                process::terminate(&mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                info!(command = %line, "Command cancelled");
                Outcome::Cancelled
            }
        };

        info!(
            command = %line,
            outcome = ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        outcome
    }
}

async fn deliver(sink: &Arc<dyn OutputSink>, chunk: OutputChunk) {
    if let Err(e) = sink.deliver(chunk).await {
        debug!(error = %e, "Dropping chunk, sink closed");
    }
}

async fn report(sink: &Arc<dyn OutputSink>, message: String) {
    deliver(sink, OutputChunk::system(message)).await;
}

/// Fold collected chunks into the single reply of combined mode.
/// Empty when nothing was collected; the reply is the only completion signal.
fn combine(chunks: Vec<OutputChunk>) -> OutputChunk {
    let tag = if !chunks.is_empty() && chunks.iter().all(|c| c.tag == StreamTag::System) {
        StreamTag::System
    } else {
        StreamTag::Stdout
    };
    let mut content = String::new();
    for chunk in chunks {
        if chunk.tag == StreamTag::System && !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&chunk.content);
    }
    OutputChunk::new(tag, content)
}
