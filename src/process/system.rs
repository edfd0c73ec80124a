//! Command execution against the real host

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{display_command, CommandOutput, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
use crate::error::{HardenError, Result};

/// Timeout for collecting output from child process pipes
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured size per stream (1MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Runs commands as child processes of this one.
///
/// Package tools are told not to prompt (`DEBIAN_FRONTEND=noninteractive`)
/// and stdin is closed, so a command can never block on terminal input.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    default_timeout: Duration,
    env: Vec<(String, String)>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            env: vec![(
                "DEBIAN_FRONTEND".to_string(),
                "noninteractive".to_string(),
            )],
        }
    }

    /// Add an environment variable passed to every command
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn spawn(&self, argv: &[String], rendered: &str) -> Result<Child> {
        let program = resolve_program(argv, rendered)?;

        let mut cmd = Command::new(program);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.spawn().map_err(|e| HardenError::Execution {
            command: rendered.to_string(),
            message: e.to_string(),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn run_with_timeout(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput> {
        let rendered = display_command(argv);
        debug!(command = %rendered, timeout_secs = timeout.as_secs(), "Running command");

        let start = Instant::now();
        let mut child = self.spawn(argv, &rendered)?;

        // Drain both pipes while waiting; a child blocked on a full pipe
        // buffer would otherwise never exit.
        let stdout_rx = drain_in_background(child.stdout.take());
        let stderr_rx = drain_in_background(child.stderr.take());

        let wait_result = child.wait_timeout(timeout).map_err(|e| HardenError::Execution {
            command: rendered.clone(),
            message: format!("failed to wait for process: {e}"),
        })?;

        let status = match wait_result {
            Some(status) => status,
            None => {
                warn!(command = %rendered, timeout_secs = timeout.as_secs(), "Command timed out, killing it");
                kill_child_process(&mut child);
                return Err(HardenError::Timeout {
                    command: rendered,
                    after: timeout,
                });
            }
        };

        let stdout = stdout_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| "[output collection timed out]".to_string());
        let stderr = stderr_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| "[output collection timed out]".to_string());

        let output = CommandOutput::new(rendered, status.code(), stdout, stderr, start.elapsed());
        debug!(
            command = %output.command,
            exit_code = ?output.exit_code,
            duration_ms = output.duration.as_millis() as u64,
            "Command finished"
        );
        Ok(output)
    }
}

/// Locate `argv[0]`, either as an explicit path or on `PATH`.
fn resolve_program(argv: &[String], rendered: &str) -> Result<PathBuf> {
    let program = argv.first().ok_or_else(|| HardenError::Execution {
        command: rendered.to_string(),
        message: "empty command".to_string(),
    })?;

    if program.contains('/') {
        let path = PathBuf::from(program);
        if !path.exists() {
            return Err(HardenError::Execution {
                command: rendered.to_string(),
                message: format!("{program} does not exist"),
            });
        }
        return Ok(path);
    }

    which::which(program).map_err(|_| HardenError::Execution {
        command: rendered.to_string(),
        message: format!("{program} not found in PATH"),
    })
}

fn drain_in_background<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_stream_to_string(stream));
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// Read a stream to string, keeping at most MAX_OUTPUT_SIZE bytes.
///
/// The remainder is drained and discarded so the child never sees a broken pipe.
fn read_stream_to_string<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let remaining = MAX_OUTPUT_SIZE.saturating_sub(buf.len());
                let to_copy = n.min(remaining);
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    let mut discard = [0u8; 8192];
                    while stream.read(&mut discard).unwrap_or(0) > 0 {}
                    buf.extend_from_slice(b"\n[output truncated at 1MB]");
                    break;
                }
            }
            Err(_) => {
                if buf.is_empty() {
                    return "[error reading output]".to_string();
                }
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn kill_child_process(child: &mut Child) {
    // The process may already have exited
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::argv;
    use std::io::Cursor;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let runner = SystemRunner::default();
        let out = runner
            .run(&argv(["sh", "-c", "echo hello; echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[test]
    fn test_non_zero_exit_is_not_an_error() {
        let runner = SystemRunner::default();
        let out = runner.run(&argv(["false"])).unwrap();
        assert_eq!(out.exit_code, Some(1));
    }

    #[test]
    fn test_missing_executable_is_execution_error() {
        let runner = SystemRunner::default();
        let err = runner
            .run(&argv(["definitely-not-a-real-binary-xyz"]))
            .unwrap_err();
        assert!(matches!(err, HardenError::Execution { .. }), "got {err:?}");
    }

    #[test]
    fn test_empty_argv_is_execution_error() {
        let runner = SystemRunner::default();
        let err = runner.run(&[]).unwrap_err();
        assert!(matches!(err, HardenError::Execution { .. }));
    }

    #[test]
    fn test_timeout_kills_command() {
        let runner = SystemRunner::default();
        let start = Instant::now();
        let err = runner
            .run_with_timeout(&argv(["sleep", "10"]), Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, HardenError::Timeout { .. }), "got {err:?}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_environment_is_passed() {
        let runner = SystemRunner::default().with_env("RAMPART_TEST_VAR", "42");
        let out = runner
            .run(&argv(["sh", "-c", "echo $DEBIAN_FRONTEND $RAMPART_TEST_VAR"]))
            .unwrap();
        assert_eq!(out.stdout.trim(), "noninteractive 42");
    }

    #[test]
    fn test_read_stream_truncates_at_limit() {
        let data = vec![b'x'; MAX_OUTPUT_SIZE + 1000];
        let result = read_stream_to_string(Cursor::new(data));
        assert!(result.contains("[output truncated at 1MB]"));
        assert!(result.len() <= MAX_OUTPUT_SIZE + 50);
    }

    #[test]
    fn test_read_stream_exact_limit() {
        let data = vec![b'y'; MAX_OUTPUT_SIZE];
        let result = read_stream_to_string(Cursor::new(data));
        assert!(!result.contains("[output truncated"));
        assert_eq!(result.len(), MAX_OUTPUT_SIZE);
    }
}
