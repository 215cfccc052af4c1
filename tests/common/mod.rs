use anyhow::Result;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Isolated environment for driving the compiled binary.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    /// Config file inside the temp dir so runs never touch the real one.
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("config.toml")
    }
}

/// Run the pkb binary with the given arguments against an isolated config.
pub fn run_pkb(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pkb"));
    command.arg("--config").arg(env.config_path());
    command.args(args);

    let output = command.output()?;
    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
