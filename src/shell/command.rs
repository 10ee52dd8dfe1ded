//! Shell command execution.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, WorkerError};

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(line) | OutputLine::Stderr(line) => line,
        }
    }
}

/// Run `script` through the platform shell, passing each output line to
/// `on_line` as it arrives.
///
/// The child is killed if the returned future is dropped before it
/// completes, so racing this against a cancellation token stops the
/// process.
pub async fn execute_streaming(
    script: &str,
    options: &CommandOptions,
    mut on_line: impl FnMut(OutputLine),
) -> Result<CommandResult> {
    let start = Instant::now();
    let (shell, flag) = shell_invocation();

    let mut cmd = Command::new(shell);
    cmd.arg(flag).arg(script);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running script with {} {}", shell, flag);
    let mut child = cmd.spawn().map_err(|err| {
        debug!("Failed to spawn shell: {}", err);
        WorkerError::CommandFailed {
            command: script.to_string(),
            code: None,
        }
    })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, tx.clone(), OutputLine::Stdout)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(stderr, tx.clone(), OutputLine::Stderr)));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        on_line(line);
    }
    for reader in readers {
        let _ = reader.await;
    }

    let status = child.wait().await?;

    Ok(CommandResult {
        exit_code: status.code(),
        duration: start.elapsed(),
        success: status.success(),
    })
}

async fn forward_lines<R>(
    stream: R,
    tx: mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).is_err() {
            break;
        }
    }
}

/// Shell executable and the flag that makes it run a command string.
///
/// Scripts run non-interactively so that job output does not depend on
/// the user's shell profile.
fn shell_invocation() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd.exe", "/C")
    } else {
        ("/bin/sh", "-c")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    async fn run(script: &str, options: &CommandOptions) -> (CommandResult, Vec<OutputLine>) {
        let mut lines = Vec::new();
        let result = execute_streaming(script, options, |line| lines.push(line))
            .await
            .unwrap();
        (result, lines)
    }

    #[tokio::test]
    async fn execute_successful_command() {
        let (result, lines) = run("echo hello", &CommandOptions::default()).await;

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(lines, vec![OutputLine::Stdout("hello".to_string())]);
    }

    #[tokio::test]
    async fn execute_failing_command() {
        let (result, _) = run("exit 3", &CommandOptions::default()).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn separates_stdout_and_stderr() {
        let (_, lines) = run("echo out; echo err >&2", &CommandOptions::default()).await;

        assert!(lines.contains(&OutputLine::Stdout("out".to_string())));
        assert!(lines.contains(&OutputLine::Stderr("err".to_string())));
    }

    #[tokio::test]
    async fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("MY_VAR".to_string(), "my_value".to_string());

        let (_, lines) = run("echo $MY_VAR", &options).await;

        assert_eq!(lines[0].text(), "my_value");
        assert!(std::env::var("MY_VAR").is_err());
    }

    #[tokio::test]
    async fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let (result, lines) = run("pwd", &options).await;

        assert!(result.success);
        let name = temp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(lines[0].text().ends_with(&name));
    }

    #[tokio::test]
    async fn lines_arrive_while_running() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let task = tokio::spawn(async move {
            execute_streaming("echo first; sleep 5", &CommandOptions::default(), move |line| {
                sink.lock().unwrap().push(line)
            })
            .await
        });

        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(seen.lock().unwrap()[0].text(), "first");
        task.abort();
    }

    #[tokio::test]
    async fn dropping_the_future_stops_the_command() {
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            execute_streaming("sleep 10", &CommandOptions::default(), |_| {}),
        )
        .await;

        assert!(outcome.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_working_directory_fails_to_spawn() {
        let options = CommandOptions {
            cwd: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        let err = execute_streaming("true", &options, |_| {}).await.unwrap_err();
        assert!(matches!(err, WorkerError::CommandFailed { code: None, .. }));
    }
}
