//! Deadline-supervised execution of external package tooling.
//!
//! One external process per call. Outcomes are captured and classified at
//! this boundary; retry policy belongs to the caller.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use super::error::BridgeError;
use super::privilege::{PrivilegeMode, PrivilegeSession};

/// Default deadline for a single external invocation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

/// A single external invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub needs_privilege: bool,
    pub deadline: Option<Duration>,
}

impl ExecRequest {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            needs_privilege: false,
            deadline: None,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.needs_privilege = true;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The command as it would be typed, for diagnostics.
    pub fn render(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.clone());
        words.extend(self.args.iter().cloned());
        shell_words::join(words)
    }
}

/// Captured outcome of one external process.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-empty stderr line, falling back to the exit code. Used for
    /// per-item failure messages.
    pub fn failure_reason(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("exited with code {}", self.exit_code))
    }
}

/// Runs external commands with privilege routing and a hard deadline.
#[derive(Clone)]
pub struct CommandExecutor {
    session: Arc<PrivilegeSession>,
    deadline: Duration,
}

impl CommandExecutor {
    pub fn new(session: Arc<PrivilegeSession>, deadline: Duration) -> Self {
        Self { session, deadline }
    }

    /// Spawn the external process and wait for it to exit or hit the
    /// deadline. On deadline the process is killed and the call is classified
    /// as `TIMEOUT`. A non-zero exit is not an error at this layer.
    pub async fn execute(&self, request: ExecRequest) -> Result<ExecOutcome, BridgeError> {
        let (program, args) = self.route(&request)?;

        if which::which(&program).is_err() {
            return Err(BridgeError::CommandNotFound { command: program });
        }

        let deadline = request.deadline.unwrap_or(self.deadline);
        let rendered = request.render();

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::System {
                command: rendered.clone(),
                message: format!("failed to spawn process: {e}"),
            })?;

        // Dropping the wait future on timeout kills the child via
        // kill_on_drop, so no orphan survives the deadline.
        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecOutcome {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(BridgeError::System {
                command: rendered,
                message: format!("failed to collect process output: {e}"),
            }),
            Err(_) => Err(BridgeError::Timeout {
                command: rendered,
                seconds: deadline.as_secs(),
            }),
        }
    }

    /// Apply privilege routing: root runs bare, an authenticated session is
    /// prefixed with `sudo -n` (never an interactive prompt), anything else
    /// fails fast.
    fn route(&self, request: &ExecRequest) -> Result<(String, Vec<String>), BridgeError> {
        if !request.needs_privilege {
            return Ok((request.program.clone(), request.args.clone()));
        }

        match self.session.mode() {
            PrivilegeMode::Root => Ok((request.program.clone(), request.args.clone())),
            PrivilegeMode::Sudo => {
                let mut args = Vec::with_capacity(request.args.len() + 2);
                args.push("-n".to_string());
                args.push(request.program.clone());
                args.extend(request.args.iter().cloned());
                Ok(("sudo".to_string(), args))
            }
            PrivilegeMode::Unauthenticated => Err(BridgeError::PermissionDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::error::ErrorCode;
    use crate::bridge::privilege::PrivilegeManager;

    fn executor(root: bool, authenticated: bool) -> CommandExecutor {
        let manager = PrivilegeManager::for_tests(root, authenticated, Duration::from_secs(60));
        CommandExecutor::new(manager.session(), DEFAULT_DEADLINE)
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let outcome = executor(false, false)
            .execute(ExecRequest::new("sh", ["-c", "echo out; echo err >&2"]))
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_outcome_not_an_error() {
        let outcome = executor(false, false)
            .execute(ExecRequest::new("sh", ["-c", "echo broken >&2; exit 3"]))
            .await
            .unwrap();

        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.failure_reason(), "broken");
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_not_found() {
        let err = executor(false, false)
            .execute(ExecRequest::new("pkb-no-such-binary", Vec::<String>::new()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::CommandNotFound);
    }

    #[tokio::test]
    async fn test_deadline_produces_timeout() {
        let err = executor(false, false)
            .execute(
                ExecRequest::new("sleep", ["5"]).deadline(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        match err {
            BridgeError::Timeout { command, .. } => assert!(command.contains("sleep")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_privileged_call_without_session_fails_fast() {
        let err = executor(false, false)
            .execute(ExecRequest::new("true", Vec::<String>::new()).privileged())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_root_runs_privileged_commands_bare() {
        let outcome = executor(true, true)
            .execute(ExecRequest::new("sh", ["-c", "echo root"]).privileged())
            .await
            .unwrap();

        assert_eq!(outcome.stdout.trim(), "root");
    }

    #[test]
    fn test_render_quotes_hostile_arguments() {
        let request = ExecRequest::new("pacman", ["-S", "has space", "quo'te"]);
        let rendered = request.render();
        assert!(rendered.starts_with("pacman -S"));
        assert!(rendered.contains("'has space'"));
    }
}
