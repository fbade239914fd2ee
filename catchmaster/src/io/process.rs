//! Child-process runner for command-backed text generation.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes of stderr kept for diagnostics.
const STDERR_KEEP_BYTES: usize = 4 * 1024;

/// What a generator command produced.
#[derive(Debug)]
pub struct ChildReply {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Stdout bytes read past the limit and thrown away.
    pub dropped_bytes: u64,
    pub timed_out: bool,
}

impl ChildReply {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Last non-blank stderr line.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Capture {
    kept: Vec<u8>,
    dropped: u64,
}

/// Spawn `cmd`, write `input` to its stdin, and wait up to `timeout`.
///
/// Both pipes are drained on their own threads while the child runs. Stdout
/// beyond `stdout_limit` is read and discarded; a child that outlives the
/// timeout is killed.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, stdout_limit))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    stdout_limit: usize,
) -> Result<ChildReply> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn generator command")?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("stdout not piped"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("stderr not piped"))?;
    let stdout_reader = thread::spawn(move || drain(stdout, stdout_limit));
    let stderr_reader = thread::spawn(move || drain(stderr, STDERR_KEEP_BYTES));

    {
        let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("stdin not piped"))?;
        match stdin.write_all(input) {
            Ok(()) => {}
            // The child may exit without reading its input.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("generator closed stdin early");
            }
            Err(err) => return Err(err).context("write generator stdin"),
        }
    }

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for generator")? {
        Some(status) => (status, false),
        None => {
            warn!("generator command timed out, killing");
            child.kill().context("kill generator")?;
            (child.wait().context("reap generator")?, true)
        }
    };

    let out = collect(stdout_reader).context("collect stdout")?;
    let err = collect(stderr_reader).context("collect stderr")?;
    if out.dropped > 0 {
        warn!(dropped_bytes = out.dropped, "generator output truncated");
    }
    debug!(exit_code = ?status.code(), timed_out, "generator command finished");

    Ok(ChildReply {
        status,
        stdout: String::from_utf8_lossy(&out.kept).into_owned(),
        stderr: String::from_utf8_lossy(&err.kept).into_owned(),
        dropped_bytes: out.dropped,
        timed_out,
    })
}

fn drain<R: Read>(mut reader: R, limit: usize) -> io::Result<Capture> {
    let mut capture = Capture::default();
    reader
        .by_ref()
        .take(limit as u64)
        .read_to_end(&mut capture.kept)?;
    capture.dropped = io::copy(&mut reader, &mut io::sink())?;
    Ok(capture)
}

fn collect(handle: JoinHandle<io::Result<Capture>>) -> Result<Capture> {
    handle
        .join()
        .map_err(|_| anyhow!("pipe reader panicked"))?
        .map_err(Into::into)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn echoes_input_through_cat() {
        let reply = run_with_input(
            Command::new("cat"),
            b"hello door",
            Duration::from_secs(5),
            1_000,
        )
        .expect("run cat");
        assert!(reply.succeeded());
        assert_eq!(reply.stdout, "hello door");
    }

    #[test]
    fn drops_output_past_the_limit() {
        let reply = run_with_input(
            Command::new("cat"),
            b"0123456789",
            Duration::from_secs(5),
            4,
        )
        .expect("run cat");
        assert_eq!(reply.stdout, "0123");
        assert_eq!(reply.dropped_bytes, 6);
    }

    #[test]
    fn kills_a_slow_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let reply = run_with_input(cmd, b"", Duration::from_millis(100), 100).expect("run sleep");
        assert!(reply.timed_out);
        assert!(!reply.succeeded());
    }

    #[test]
    fn keeps_the_last_stderr_line() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo first >&2; echo 'quota exceeded' >&2; exit 3"]);
        let reply = run_with_input(cmd, b"", Duration::from_secs(5), 100).expect("run sh");
        assert_eq!(reply.status.code(), Some(3));
        assert_eq!(reply.stderr_tail(), "quota exceeded");
    }
}
