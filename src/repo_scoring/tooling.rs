//! Lint and test checks, which shell out to external tools.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use log::*;
use tokio::process::Command;

use crate::config::TOKEN_VAR;
use crate::error::{CheckExecutionError, ConfigError, TimeoutError};

/// An external program and its leading arguments. The path under
/// inspection is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  pub program: String,
  pub args: Vec<String>,
}

impl FromStr for ToolCommand {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.split_whitespace().map(String::from);
    let program = parts
      .next()
      .ok_or_else(|| ConfigError::InvalidCommand(s.to_string()))?;

    Ok(ToolCommand {
      program,
      args: parts.collect(),
    })
  }
}

impl fmt::Display for ToolCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSettings {
  /// Presence of this file means the project has set up linting.
  pub config_file: String,
  pub command: ToolCommand,
}

impl Default for LintSettings {
  fn default() -> Self {
    LintSettings {
      config_file: ".flake8".to_string(),
      command: ToolCommand {
        program: "flake8".to_string(),
        args: Vec::new(),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSettings {
  pub dir: String,
  pub command: ToolCommand,
}

impl Default for TestSettings {
  fn default() -> Self {
    TestSettings {
      dir: "tests".to_string(),
      command: ToolCommand {
        program: "pytest".to_string(),
        args: Vec::new(),
      },
    }
  }
}

/// Runs `command` against `target` from inside `root`. Output is captured
/// but only the exit status matters. The submission's tooling is untrusted,
/// so the GitHub token is withheld from its environment.
pub async fn run_tool(
  command: &ToolCommand,
  root: &Path,
  target: &Path,
  timeout: Duration,
) -> Result<bool, CheckExecutionError> {
  debug!("Running {} on {}", command, target.display());

  let child = Command::new(&command.program)
    .args(&command.args)
    .arg(target)
    .current_dir(root)
    .env_remove(TOKEN_VAR)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| CheckExecutionError::Spawn {
      program: command.program.clone(),
      source,
    })?;

  let output = tokio::time::timeout(timeout, child.wait_with_output())
    .await
    .map_err(|_| TimeoutError::new(command.to_string(), timeout))?
    .map_err(|source| CheckExecutionError::Io {
      path: root.to_path_buf(),
      source,
    })?;

  if !output.status.success() {
    debug!(
      "{} exited with {}: {}",
      command,
      output.status,
      String::from_utf8_lossy(&output.stderr).trim()
    );
  }

  Ok(output.status.success())
}

/// Fails when no lint configuration is present, since linting was never
/// set up.
pub async fn lint_passes(
  root: &Path,
  settings: &LintSettings,
  timeout: Duration,
) -> Result<bool, CheckExecutionError> {
  if !root.join(&settings.config_file).is_file() {
    debug!("No {} found, lint not set up", settings.config_file);
    return Ok(false);
  }

  run_tool(&settings.command, root, root, timeout).await
}

/// Fails when the test directory is missing.
pub async fn tests_pass(
  root: &Path,
  settings: &TestSettings,
  timeout: Duration,
) -> Result<bool, CheckExecutionError> {
  let test_dir = root.join(&settings.dir);
  if !test_dir.is_dir() {
    debug!("No {} directory found", settings.dir);
    return Ok(false);
  }

  run_tool(&settings.command, root, &test_dir, timeout).await
}
