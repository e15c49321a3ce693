// crates/compliance-gate-runner/src/process.rs
// ============================================================================
// Module: Process Command Runner
// Description: Command runner backed by operating system processes.
// Purpose: Execute resolved commands with bounded capture and hard timeouts.
// Dependencies: compliance-gate-core, async-trait, nix, tokio
// ============================================================================

//! ## Overview
//! [`ProcessCommandRunner`] spawns exactly one process per call with the
//! argument vector passed through unchanged (no shell). Stdout and stderr are
//! drained by background tasks while the child is awaited, so a chatty child
//! cannot block on a full pipe; bytes beyond the capture limit are discarded
//! and flagged per stream.
//!
//! On unix each child leads its own process group. The timeout covers only
//! the wait for the direct child; on expiry the whole group is killed and the
//! child reaped. Once the child has exited, descendants that still hold the
//! pipes get [`OUTPUT_DRAIN_GRACE`] to close them before the group is killed
//! and whatever was captured is kept. Dropped futures also kill the child
//! through `kill_on_drop`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use compliance_gate_core::CommandResult;
use compliance_gate_core::CommandRunner;
use compliance_gate_core::ResolvedCommand;
use compliance_gate_core::RunnerError;
#[cfg(unix)]
use nix::sys::signal::Signal;
#[cfg(unix)]
use nix::sys::signal::killpg;
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default capture limit per stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;
/// Exit code recorded when a process was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;
/// Time allowed for pipes to reach end of file after the child has exited.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);
/// Read chunk size for pipe draining.
const READ_CHUNK_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Execution context applied to every spawned process.
///
/// # Invariants
/// - `env` entries are applied after `clear_env`, so they survive clearing.
/// - `max_output_bytes` bounds each stream independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerContext {
    /// Environment variables set on every process (for example project and region).
    pub env: BTreeMap<String, String>,
    /// Working directory for spawned processes.
    pub working_dir: Option<PathBuf>,
    /// Start processes with an empty environment.
    pub clear_env: bool,
    /// Maximum captured bytes per stream.
    pub max_output_bytes: usize,
}

impl Default for RunnerContext {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            working_dir: None,
            clear_env: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl RunnerContext {
    /// Adds one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Command runner that spawns local processes.
pub struct ProcessCommandRunner {
    /// Context applied to every process.
    context: RunnerContext,
}

impl ProcessCommandRunner {
    /// Creates a runner with the given context.
    #[must_use]
    pub const fn new(context: RunnerContext) -> Self {
        Self {
            context,
        }
    }

    /// Returns the execution context.
    #[must_use]
    pub const fn context(&self) -> &RunnerContext {
        &self.context
    }

    /// Builds the process command for a resolved command.
    fn build(&self, command: &ResolvedCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if self.context.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&self.context.env);
        if let Some(dir) = &self.context.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn execute(
        &self,
        command: &ResolvedCommand,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError> {
        let started = Instant::now();
        let mut child = self.build(command).spawn().map_err(|err| RunnerError::Spawn {
            program: command.program.clone(),
            message: err.to_string(),
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Io("stdout pipe unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Io("stderr pipe unavailable".to_string()))?;
        let limit = self.context.max_output_bytes;
        let group = ProcessGroup::of(&child);
        let stdout = tokio::spawn(read_capped(stdout, limit));
        let stderr = tokio::spawn(read_capped(stderr, limit));

        let Ok(status) = tokio::time::timeout(timeout, child.wait()).await else {
            group.kill();
            let _ = child.kill().await;
            stdout.abort();
            let stderr = drain(stderr, group).await?;
            return Ok(CommandResult::timed_out(stderr.bytes, started.elapsed()));
        };
        let status = status.map_err(|err| RunnerError::Io(err.to_string()))?;
        let stdout = drain(stdout, group).await?;
        let stderr = drain(stderr, group).await?;
        let mut result = CommandResult::completed(
            status.code().unwrap_or(SIGNALED_EXIT_CODE),
            stdout.bytes,
            stderr.bytes,
            started.elapsed(),
        );
        result.stdout_truncated = stdout.truncated;
        result.stderr_truncated = stderr.truncated;
        Ok(result)
    }
}

// ============================================================================
// SECTION: Process Groups
// ============================================================================

/// Process group led by a spawned child.
#[derive(Debug, Clone, Copy)]
struct ProcessGroup(Option<i32>);

impl ProcessGroup {
    /// Returns the group of a child spawned with `process_group(0)`.
    fn of(child: &Child) -> Self {
        Self(child.id().and_then(|id| i32::try_from(id).ok()))
    }

    /// Sends `SIGKILL` to every process left in the group.
    #[cfg(unix)]
    fn kill(self) {
        if let Some(pgid) = self.0 {
            // ESRCH once every member has exited.
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }

    /// Platforms without process groups rely on killing the direct child.
    #[cfg(not(unix))]
    const fn kill(self) {
        let _ = self.0;
    }
}

/// Waits for a capture task, killing the group if the pipe stays open past the grace period.
async fn drain(
    mut task: JoinHandle<io::Result<Capture>>,
    group: ProcessGroup,
) -> Result<Capture, RunnerError> {
    let joined = match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            group.kill();
            match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Ok(Capture::default());
                }
            }
        }
    };
    joined
        .map_err(|err| RunnerError::Io(err.to_string()))?
        .map_err(|err| RunnerError::Io(err.to_string()))
}

// ============================================================================
// SECTION: Capture
// ============================================================================

/// Captured stream contents.
#[derive(Default)]
struct Capture {
    /// Retained bytes (at most the limit).
    bytes: Vec<u8>,
    /// True when bytes were discarded.
    truncated: bool,
}

/// Drains a stream to end of file, retaining at most `limit` bytes.
async fn read_capped<R>(mut reader: R, limit: usize) -> io::Result<Capture>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    let mut truncated = false;
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let room = limit.saturating_sub(bytes.len());
        if read > room {
            truncated = true;
        }
        bytes.extend_from_slice(&chunk[.. read.min(room)]);
    }
    Ok(Capture {
        bytes,
        truncated,
    })
}
