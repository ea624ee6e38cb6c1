//! External command execution with a hard wall-clock timeout.
//!
//! Diagnostic commands (version checks, process samples, permission dumps)
//! are untrusted in the sense that they may hang. Each one runs in its own
//! process group; when the deadline passes the whole group is killed, the
//! child is reaped and the output readers are aborted, so a timeout never
//! leaves a process or a pipe behind. Failures are reported as a
//! [`CommandStatus`] rather than an error so the pipeline can continue.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Timeout applied when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-stream capture limit; output beyond it is drained and dropped.
const MAX_CAPTURE_BYTES: usize = 1 << 20;

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandStatus {
    /// Process exited; `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32> },
    /// Deadline passed; the process group was killed.
    TimedOut,
    /// The program could not be started.
    SpawnFailed { message: String },
}

/// Captured result of one command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: CommandStatus,
    #[serde(skip)]
    pub pid: Option<u32>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == CommandStatus::Exited { code: Some(0) }
    }

    fn sentinel(status: CommandStatus, pid: Option<u32>, started: Instant) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            status,
            pid,
            elapsed: started.elapsed(),
        }
    }
}

/// Runs external programs with a timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a command line through `sh -c`.
    pub async fn run_shell(&self, command_line: &str) -> CommandOutput {
        self.run("sh", &["-c".to_string(), command_line.to_string()])
            .await
    }

    /// Run `program` with `args`, waiting at most the configured timeout.
    pub async fn run(&self, program: &str, args: &[String]) -> CommandOutput {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(program, error = %e, "failed to spawn command");
                return CommandOutput::sentinel(
                    CommandStatus::SpawnFailed {
                        message: e.to_string(),
                    },
                    None,
                    started,
                );
            }
        };
        let pid = child.id();
        let stdout_task = tokio::spawn(read_capped(child.stdout.take()));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take()));

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep_until(deadline) => None,
        };

        let status = match waited {
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                warn!(program, error = %e, "failed waiting for command");
                terminate(&mut child, &stdout_task, &stderr_task).await;
                return CommandOutput::sentinel(
                    CommandStatus::SpawnFailed {
                        message: e.to_string(),
                    },
                    pid,
                    started,
                );
            }
            None => {
                warn!(program, timeout_secs = self.timeout.as_secs_f64(), "command timed out");
                terminate(&mut child, &stdout_task, &stderr_task).await;
                return CommandOutput::sentinel(CommandStatus::TimedOut, pid, started);
            }
        };

        // Descendants may still hold the pipes open after the child exits;
        // the remaining budget bounds the drain.
        let drained = tokio::time::timeout_at(deadline, async {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            (stdout, stderr)
        })
        .await;

        match drained {
            Ok((stdout, stderr)) => CommandOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                status: CommandStatus::Exited {
                    code: status.code(),
                },
                pid,
                elapsed: started.elapsed(),
            },
            Err(_) => {
                warn!(program, "command output still open at deadline");
                kill_process_group(pid);
                CommandOutput::sentinel(CommandStatus::TimedOut, pid, started)
            }
        }
    }
}

/// Kill the child's process group, reap the child and stop the readers.
async fn terminate(
    child: &mut Child,
    stdout_task: &JoinHandle<Vec<u8>>,
    stderr_task: &JoinHandle<Vec<u8>>,
) {
    kill_process_group(child.id());
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "child already gone");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to reap killed command");
    }
    stdout_task.abort();
    stderr_task.abort();
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(pid, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                captured.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    captured
}
