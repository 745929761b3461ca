//! One-shot external process invocation.
//!
//! Every interpreter call (probe, install, render) goes through [`run`]: the
//! child gets its input on stdin, its output is captured and truncated, and
//! it is hard-killed on timeout or cancellation.

use crate::error::ProcessError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Maximum captured size per stream (1 MB).
pub const MAX_OUTPUT_BYTES: usize = 1_048_576;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            current_dir: None,
            env: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn stdin_text(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `program arg1 arg2`, for logs and install hints.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub program: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `spec` to completion. A spawn failure is reported as
/// [`ProcessError::Spawn`]; a non-zero exit is not an error.
pub async fn run(
    spec: &CommandSpec,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    tracing::debug!(command = %spec.display(), pid = ?child.id(), "spawned");

    if let (Some(text), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) {
        tokio::spawn(async move {
            // A child that exits without reading closes the pipe; that is its business.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                tracing::debug!("stdin write ended early: {e}");
            }
        });
    }

    // Dropping the wait future drops the child, and kill_on_drop kills it.
    let waiting = tokio::time::timeout(spec.timeout, child.wait_with_output());
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!(command = %spec.program, "cancelled, killing child");
            return Err(ProcessError::Cancelled {
                program: spec.program.clone(),
            });
        }
        result = waiting => result,
    };

    match result {
        Ok(Ok(output)) => Ok(ProcessOutput {
            program: spec.program.clone(),
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: truncate_lossy(&output.stdout, "output"),
            stderr: truncate_lossy(&output.stderr, "stderr"),
        }),
        Ok(Err(source)) => Err(ProcessError::Io {
            program: spec.program.clone(),
            source,
        }),
        Err(_) => Err(ProcessError::TimedOut {
            program: spec.program.clone(),
            secs: spec.timeout.as_secs(),
        }),
    }
}

/// Result of trying interpreter candidates in order.
#[derive(Debug)]
pub enum Launch {
    Ran {
        program: String,
        output: ProcessOutput,
    },
    NoneStarted {
        tried: Vec<String>,
    },
}

/// Try each candidate in order. Only a failure to start advances to the next
/// one; once a program runs, its result is final whatever the exit status.
pub async fn run_first_available<F>(
    candidates: &[String],
    cancel: &CancellationToken,
    build: F,
) -> Result<Launch, ProcessError>
where
    F: Fn(&str) -> CommandSpec,
{
    let mut tried = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let spec = build(candidate);
        match run(&spec, cancel).await {
            Ok(output) => {
                return Ok(Launch::Ran {
                    program: candidate.clone(),
                    output,
                });
            }
            Err(e) if e.is_launch_failure() => {
                tracing::debug!(candidate = %candidate, "not usable: {e}");
                tried.push(candidate.clone());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Launch::NoneStarted { tried })
}

fn truncate_lossy(bytes: &[u8], stream: &str) -> String {
    let mut text = String::from_utf8_lossy(bytes).to_string();
    if text.len() > MAX_OUTPUT_BYTES {
        text.truncate(text.floor_char_boundary(MAX_OUTPUT_BYTES));
        text.push_str(&format!("\n... [{stream} truncated at 1MB]"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let output = run(&sh("echo out; echo err >&2; exit 3"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success);
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let spec = CommandSpec::new("cat").stdin_text("circuit source\n");
        let output = run(&spec, &CancellationToken::new()).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "circuit source\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::new("qcompat-definitely-not-installed");
        let err = run(&spec, &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let spec = sh("sleep 30").timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = run(&spec, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancellation_is_reported() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = run(&sh("sleep 30"), &cancel).await.unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn fallback_skips_unlaunchable_candidates() {
        let candidates = vec![
            "/nonexistent/python3".to_string(),
            "qcompat-missing-python".to_string(),
            "sh".to_string(),
        ];
        let launch = run_first_available(&candidates, &CancellationToken::new(), |program| {
            CommandSpec::new(program).arg("-c").arg("exit 1")
        })
        .await
        .unwrap();
        match launch {
            Launch::Ran { program, output } => {
                assert_eq!(program, "sh");
                assert_eq!(output.exit_code, Some(1));
            }
            Launch::NoneStarted { tried } => panic!("nothing started: {tried:?}"),
        }
    }

    #[tokio::test]
    async fn fallback_reports_every_tried_candidate() {
        let candidates = vec!["/nonexistent/a".to_string(), "/nonexistent/b".to_string()];
        let launch = run_first_available(&candidates, &CancellationToken::new(), |program: &str| {
            CommandSpec::new(program)
        })
        .await
        .unwrap();
        match launch {
            Launch::NoneStarted { tried } => assert_eq!(tried, candidates),
            Launch::Ran { .. } => panic!("expected no candidate to start"),
        }
    }

    #[test]
    fn oversized_output_is_truncated() {
        let big = vec![b'a'; MAX_OUTPUT_BYTES + 10];
        let text = truncate_lossy(&big, "output");
        assert!(text.ends_with("[output truncated at 1MB]"));
        assert!(text.len() < MAX_OUTPUT_BYTES + 64);
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("python3").args(["-m", "pip", "install", "qiskit"]);
        assert_eq!(spec.display(), "python3 -m pip install qiskit");
    }
}
