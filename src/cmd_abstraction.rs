//! External command execution behind a trait, so git interactions can be
//! mocked in tests.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code 0
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// stdout and stderr joined, for matching tool messages
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs a program with arguments inside a working directory.
///
/// Arguments are `&[String]` because mockall cannot express `&[&str]`.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, cmd: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;
}

/// Executes real processes, with stdin closed
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to run {}", cmd))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Runs a single program (such as `git`) in a fixed directory
pub struct ToolRunner<E: CommandExecutor> {
    executor: E,
    program: String,
    cwd: PathBuf,
}

impl<E: CommandExecutor> ToolRunner<E> {
    pub fn new(executor: E, program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            program: program.into(),
            cwd: cwd.into(),
        }
    }

    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        self.executor
            .execute(&self.program, &args_to_strings(args), &self.cwd)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_to_strings() {
        assert_eq!(args_to_strings(&["add", "--all"]), vec!["add", "--all"]);
        assert!(args_to_strings(&[]).is_empty());
    }

    #[test]
    fn test_real_executor_runs_in_cwd() {
        let dir = TempDir::new().unwrap();
        let output = RealCommandExecutor::new()
            .execute("pwd", &[], dir.path())
            .unwrap();
        assert!(output.success);
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_real_executor_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let output = RealCommandExecutor::new()
            .execute("ls", &args_to_strings(&["--invalid-flag"]), dir.path())
            .unwrap();
        assert!(!output.success);
        assert!(output.code.is_some());
    }

    #[test]
    fn test_real_executor_missing_program() {
        let dir = TempDir::new().unwrap();
        assert!(RealCommandExecutor::new()
            .execute("definitely-not-a-real-program", &[], dir.path())
            .is_err());
    }

    #[test]
    fn test_tool_runner_passes_program_and_cwd() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, args, cwd| {
                cmd == "git" && args == ["status".to_string()] && cwd == Path::new("/repo")
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(CommandOutput {
                    stdout: "clean".to_string(),
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let runner = ToolRunner::new(mock, "git", "/repo");
        let output = runner.run(&["status"]).unwrap();
        assert_eq!(output.stdout, "clean");
        assert_eq!(runner.cwd(), Path::new("/repo"));
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            ..Default::default()
        };
        assert!(output.combined().contains("out"));
        assert!(output.combined().contains("err"));
    }
}
