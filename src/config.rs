use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::repo_scoring::checks::FolderLayout;
use crate::repo_scoring::commit_cutoff::CutoffPolicy;
use crate::repo_scoring::tooling::{LintSettings, TestSettings};
use crate::repo_scoring::CheckSet;

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// The access token used for every remote call.
#[derive(Clone)]
pub struct Credentials {
  token: String,
}

impl Credentials {
  pub fn new(token: impl Into<String>) -> Self {
    Credentials {
      token: token.into(),
    }
  }

  /// Reads the token from `GITHUB_TOKEN`. An unset or blank variable is
  /// a configuration error.
  pub fn from_env() -> Result<Self, ConfigError> {
    match env::var(TOKEN_VAR) {
      Ok(token) if !token.trim().is_empty() => Ok(Credentials::new(token.trim())),
      _ => Err(ConfigError::MissingCredential(TOKEN_VAR)),
    }
  }

  pub fn token(&self) -> &str {
    &self.token
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials").field("token", &"<redacted>").finish()
  }
}

/// How a working tree is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FetchStrategy {
  /// Full git clone.
  #[default]
  Clone,
  /// Download and unpack the default branch tarball.
  Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
  /// Remote metadata calls and archive downloads.
  pub network: Duration,
  /// git clone, lint and test runs.
  pub process: Duration,
}

impl Default for Timeouts {
  fn default() -> Self {
    Timeouts {
      network: Duration::from_secs(60),
      process: Duration::from_secs(600),
    }
  }
}

/// Everything the evaluation batch needs, read-only for the whole run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
  pub org: String,
  /// Parent directory for working trees.
  pub work_dir: PathBuf,
  pub strategy: FetchStrategy,
  pub include_archived: bool,
  pub include_forks: bool,
  /// When non-empty, only these repository names are evaluated.
  pub only: Vec<String>,
  pub cutoff: CutoffPolicy,
  pub layout: FolderLayout,
  pub required_files: Vec<String>,
  pub required_dirs: Vec<String>,
  pub secret_markers: Vec<String>,
  pub lint: LintSettings,
  pub tests: TestSettings,
  pub checks: CheckSet,
  pub timeouts: Timeouts,
}

impl EvalConfig {
  pub fn new(org: impl Into<String>, cutoff: CutoffPolicy) -> Self {
    EvalConfig {
      org: org.into(),
      work_dir: PathBuf::from("repo/target"),
      strategy: FetchStrategy::default(),
      include_archived: false,
      include_forks: false,
      only: Vec::new(),
      cutoff,
      layout: FolderLayout::default(),
      required_files: vec!["README.md".to_string()],
      required_dirs: Vec::new(),
      secret_markers: vec!["SECRET_KEY".to_string()],
      lint: LintSettings::default(),
      tests: TestSettings::default(),
      checks: CheckSet::default(),
      timeouts: Timeouts::default(),
    }
  }
}
