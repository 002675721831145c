//! Bounded external process execution with combined output capture.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::mask::display_command;
use super::ToolError;

/// Everything needed to launch one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub envs: Vec<(String, OsString)>,
    /// Bytes written to the child's stdin, then closed.
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Masked command line for logs.
    pub fn display(&self) -> String {
        display_command(&self.program, &self.args)
    }
}

/// Exit status and combined stdout/stderr of a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCapture {
    pub status: Option<i32>,
    pub output: String,
}

impl CommandCapture {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Run `spec`, killing the child if it outlives `timeout`.
///
/// A non-zero exit is returned as a capture, not an error; callers decide.
pub async fn run_captured(spec: &CommandSpec, timeout: Duration) -> Result<CommandCapture, ToolError> {
    let command_line = spec.display();
    tracing::debug!(command = %command_line, "Executing command");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| ToolError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
        stdin
            .write_all(input)
            .await
            .map_err(|source| ToolError::Spawn {
                command: command_line.clone(),
                source,
            })?;
        // Dropping stdin closes the pipe so the child sees EOF.
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            command: command_line.clone(),
            source,
        })?,
        Err(_) => {
            tracing::error!(command = %command_line, timeout_secs = timeout.as_secs(), "Command timed out");
            return Err(ToolError::Timeout {
                command: command_line,
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let capture = CommandCapture {
        status: output.status.code(),
        output: combined,
    };
    tracing::debug!(command = %command_line, status = ?capture.status, output = %capture.output, "Command output");
    Ok(capture)
}

/// Like [`run_captured`] but a non-zero exit becomes [`ToolError::Failed`].
pub async fn run_checked(spec: &CommandSpec, timeout: Duration) -> Result<CommandCapture, ToolError> {
    let capture = run_captured(spec, timeout).await?;
    if capture.success() {
        return Ok(capture);
    }
    let command = spec.display();
    tracing::error!(command = %command, status = ?capture.status, "Error executing command");
    Err(ToolError::Failed {
        command,
        status: capture.status,
        output: capture.output,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err 1>&2"]);
        let capture = run_checked(&spec, TIMEOUT).await.unwrap();
        assert!(capture.output.contains("out"));
        assert!(capture.output.contains("err"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed() {
        let spec = CommandSpec::new("sh").args(["-c", "echo nope; exit 3"]);
        let capture = run_captured(&spec, TIMEOUT).await.unwrap();
        assert_eq!(capture.status, Some(3));

        let err = run_checked(&spec, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { status: Some(3), ref output, .. } if output.contains("nope")));
    }

    #[tokio::test]
    async fn hanging_command_times_out() {
        let spec = CommandSpec::new("sleep").arg("5");
        let err = run_captured(&spec, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let spec = CommandSpec::new("/nonexistent/definitely-not-p4");
        let err = run_captured(&spec, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn passes_stdin_env_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "read line; echo \"$line $GREETING $(pwd)\""])
            .env("GREETING", "hello")
            .current_dir(dir.path())
            .stdin(b"typed\n".to_vec());
        let capture = run_checked(&spec, TIMEOUT).await.unwrap();
        assert!(capture.output.starts_with("typed hello "));
        let reported = capture.output.trim().rsplit(' ').next().unwrap().to_string();
        assert_eq!(
            std::fs::canonicalize(reported).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[test]
    fn display_masks_credentials() {
        let spec = CommandSpec::new("p4").args(["P4PASSWD=secret", "login"]);
        assert_eq!(spec.display(), "p4 P4PASSWD=****** login");
    }
}
