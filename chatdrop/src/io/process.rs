//! Child process execution with a wall-clock bound and capped output.
//!
//! Validators, clipboard readers and git all go through here; a hung command
//! holds its caller for at most `timeout` plus [`OUTPUT_GRACE`].
//!
//! On unix the child leads its own process group and a timeout kills the
//! whole group, so wrapper scripts cannot leave a grandchild holding the
//! output pipes. Readers still blocked past the deadline are abandoned.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Default cap on captured stdout/stderr per stream.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// How long output readers may lag behind the child's exit or kill.
pub const OUTPUT_GRACE: Duration = Duration::from_millis(500);

type StreamResult = Result<(Vec<u8>, usize)>;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// One-line-ish explanation of a failed run: stderr, else stdout, else the
    /// exit code.
    pub fn failure_detail(&self, timeout: Duration) -> String {
        if self.timed_out {
            return format!("timed out after {}s", timeout.as_secs_f32());
        }
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `cmd`, optionally feeding `stdin`, killing it after `timeout`.
///
/// stdin, stdout and stderr are serviced on helper threads so a child that
/// writes before reading cannot deadlock us. Output beyond
/// `output_limit_bytes` per stream is drained and counted, not stored.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || {
                // The child may exit without reading its input.
                if let Err(e) = child_stdin.write_all(&input) {
                    debug!(err = %e, "child closed stdin early");
                }
            }))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    // A blocked writer means a descendant kept stdin open without reading.
    if let Some(handle) = stdin_handle
        && handle.is_finished()
        && handle.join().is_err()
    {
        warn!("stdin writer thread panicked");
    }
    let deadline = Instant::now() + OUTPUT_GRACE;
    let (stdout, stdout_truncated) =
        collect_output(&stdout_rx, deadline, "stdout").context("collect stdout")?;
    let (stderr, stderr_truncated) =
        collect_output(&stderr_rx, deadline, "stderr").context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Kill the child's process group, then the child itself.
fn kill_tree(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => debug!(exit_code = ?status.code(), "process group kill reported failure"),
            Err(e) => warn!(err = %e, "could not run kill for process group"),
        }
    }
    child.kill().context("kill command")
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamResult> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        // The receiver is gone once the reader has been abandoned.
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

/// Wait for a reader until `deadline`; past it, keep nothing and detach.
fn collect_output(rx: &Receiver<StreamResult>, deadline: Instant, stream: &str) -> StreamResult {
    let wait = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(wait) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(stream, "output pipe still held by a descendant, abandoning reader");
            Ok((Vec::new(), 0))
        }
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
