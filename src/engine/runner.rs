use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{CodeletError, Result};

/// How long to keep draining the pipes after the child is gone. The write
/// ends stay open while any descendant that inherited them is still alive,
/// so an unbounded drain could block far past the child's own exit.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Outcome of one external process invocation.
#[derive(Debug)]
pub struct RunResult {
    /// Merged standard output and standard error, one line at a time.
    pub output: String,
    /// Exit code on normal termination; -1 when killed or signal-terminated.
    pub exit_code: i32,
    pub timed_out: bool,
}

pub struct ProcessRunner;

impl ProcessRunner {
    /// Spawn `argv` and wait up to `timeout` for it to terminate.
    ///
    /// Both pipes are drained concurrently with the timed wait: a child that
    /// fills the OS pipe buffer before exiting would otherwise block forever
    /// against a sequential read-then-wait. Each stream gets a drain task
    /// appending lines into a shared merged buffer in arrival order.
    ///
    /// The child is spawned as its own process-group leader; on expiry the
    /// whole group is killed, so forked descendants die with it, and
    /// whatever output was captured so far is returned with `timed_out` set.
    pub async fn run(argv: &[String], timeout: Duration) -> Result<RunResult> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command line"))?;

        debug!(command = ?argv, timeout_secs = timeout.as_secs(), "Spawning process");

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| CodeletError::Spawn {
            program: program.clone(),
            source: e,
        })?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("child stderr was not captured"))?;

        let merged = Arc::new(Mutex::new(String::new()));
        let out_task = tokio::spawn(drain_lines(stdout, Arc::clone(&merged)));
        let err_task = tokio::spawn(drain_lines(stderr, Arc::clone(&merged)));

        let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    command = ?argv,
                    timeout_secs = timeout.as_secs(),
                    "Process exceeded timeout, killing"
                );
                kill_tree(&mut child, pid).await;
                (-1, true)
            }
        };

        // Pick up what the pipes still hold, but never past the grace bound.
        let out_abort = out_task.abort_handle();
        let err_abort = err_task.abort_handle();
        let drain = async {
            let _ = out_task.await;
            let _ = err_task.await;
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            warn!(command = ?argv, "Pipes held open past exit, abandoning drain");
            out_abort.abort();
            err_abort.abort();
        }

        let output = merged.lock().await.clone();
        debug!(exit_code, timed_out, output_len = output.len(), "Process completed");

        Ok(RunResult {
            output,
            exit_code,
            timed_out,
        })
    }
}

/// Kill the child's entire process group, then reap the child itself.
/// Killing only the direct child would leave forked descendants running
/// and holding the output pipes open.
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // The child is its own group leader (`process_group(0)` at spawn).
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill timed-out process");
    }
}

async fn drain_lines(stream: impl AsyncRead + Unpin, merged: Arc<Mutex<String>>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut buf = merged.lock().await;
        buf.push_str(&line);
        buf.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn still_running(pid: &str) -> bool {
        // Missing entry or zombie state both mean the process is done.
        match std::fs::read_to_string(format!("/proc/{}/stat", pid.trim())) {
            Ok(stat) => !stat.contains(") Z"),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let result = ProcessRunner::run(&sh("echo hi"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.output, "hi\n");
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn reports_nonzero_exit_code() {
        let result = ProcessRunner::run(&sh("exit 3"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn merges_stderr_into_output() {
        let result = ProcessRunner::run(&sh("echo out; echo err >&2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("out\n"));
        assert!(result.output.contains("err\n"));
    }

    #[tokio::test]
    async fn kills_process_on_timeout() {
        let started = Instant::now();
        let result = ProcessRunner::run(&sh("sleep 30"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn keeps_partial_output_on_timeout() {
        let result = ProcessRunner::run(&sh("echo partial; sleep 30"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(result.output.contains("partial\n"));
    }

    #[tokio::test]
    async fn process_tree_is_killed_on_timeout() {
        // The shell forks a grandchild and blocks; on timeout the whole
        // group must die, not just the shell.
        let started = Instant::now();
        let result = ProcessRunner::run(&sh("sleep 30 & echo $!; wait"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5));

        let grandchild = result.output.trim().lines().last().unwrap().to_string();
        assert!(grandchild.chars().all(|c| c.is_ascii_digit()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!still_running(&grandchild));
    }

    #[tokio::test]
    async fn lingering_background_child_does_not_stall_the_result() {
        // The shell exits immediately but its backgrounded grandchild keeps
        // the pipes open; the drain must be bounded, not wait for EOF.
        let started = Instant::now();
        let result = ProcessRunner::run(&sh("echo started; sleep 10 &"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
        assert!(result.output.contains("started\n"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn output_larger_than_pipe_buffer_does_not_deadlock() {
        // ~1.1 MB, far past the 64 KB pipe buffer.
        let result = ProcessRunner::run(
            &sh("yes 0123456789 | head -n 100000"),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
        assert_eq!(result.output.lines().count(), 100000);
    }

    #[tokio::test]
    async fn runs_a_staged_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello.sh");
        std::fs::write(&script, "echo from-script\n").unwrap();

        let argv = vec![
            "sh".to_string(),
            script.to_string_lossy().into_owned(),
        ];
        let result = ProcessRunner::run(&argv, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.output, "from-script\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let argv = vec!["definitely-not-a-real-binary-42".to_string()];
        let err = ProcessRunner::run(&argv, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CodeletError::Spawn { .. }));
    }
}
