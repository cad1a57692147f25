use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// An operation that did not finish within its allotted time.
#[derive(Debug, Error)]
#[error("{operation} timed out after {}s", .after.as_secs())]
pub struct TimeoutError {
  pub operation: String,
  pub after: Duration,
}

impl TimeoutError {
  pub fn new(operation: impl Into<String>, after: Duration) -> Self {
    TimeoutError {
      operation: operation.into(),
      after,
    }
  }
}

/// Problems with the startup configuration. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("environment variable {0} must be set")]
  MissingCredential(&'static str),

  #[error("failed to create GitHub client: {}", describe_api_error(.0))]
  Client(#[source] octocrab::Error),

  #[error("organization «{0}» was not found")]
  OrganizationNotFound(String),

  #[error("unable to read roster {path}: {source}")]
  Roster {
    path: PathBuf,
    #[source]
    source: csv::Error,
  },

  #[error("invalid folder layout «{0}», expected DIR or DIR=SUB1,SUB2")]
  InvalidLayout(String),

  #[error("invalid command «{0}»")]
  InvalidCommand(String),
}

/// Failures talking to the remote metadata API.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("GitHub API error: {}", describe_api_error(.0))]
  Api(#[from] octocrab::Error),

  #[error(transparent)]
  Timeout(#[from] TimeoutError),

  #[error("no user found for «{0}»")]
  UserNotFound(String),
}

/// octocrab only prints the variant name, so dig out GitHub's own message
/// or the underlying cause.
fn describe_api_error(err: &octocrab::Error) -> String {
  match err {
    octocrab::Error::GitHub { source, .. } => {
      format!("{} (HTTP {})", source.message, source.status_code.as_u16())
    }
    other => match std::error::Error::source(other) {
      Some(cause) => format!("{}: {}", other, cause),
      None => other.to_string(),
    },
  }
}

/// Failures while producing a local working tree for a repository.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("repository {0} has no clone URL")]
  MissingCloneUrl(String),

  #[error("git clone of {repo} failed: {stderr}")]
  Clone { repo: String, stderr: String },

  #[error("repository {0} does not exist")]
  NotFound(String),

  #[error("archive download for {repo} returned HTTP {status}")]
  Download { repo: String, status: u16 },

  #[error("HTTP error downloading archive: {0}")]
  Http(#[from] reqwest::Error),

  #[error("archive for {0} contains no top-level directory")]
  InvalidArchive(String),

  #[error("filesystem error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Timeout(#[from] TimeoutError),
}

impl FetchError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    FetchError::Io {
      path: path.into(),
      source,
    }
  }
}

/// An individual check could not be carried out.
#[derive(Debug, Error)]
pub enum CheckExecutionError {
  #[error("working tree {} is not a directory", .0.display())]
  MissingWorkingTree(PathBuf),

  #[error("I/O error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to walk working tree: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("invalid search pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("failed to launch {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Timeout(#[from] TimeoutError),

  #[error(transparent)]
  Host(#[from] HostError),
}

/// Anything that stops a single repository from being evaluated. The
/// orchestrator logs these and moves on to the next repository.
#[derive(Debug, Error)]
pub enum EvaluationError {
  #[error("fetch failed: {0}")]
  Fetch(#[from] FetchError),

  #[error("evaluation failed: {0}")]
  Evaluate(#[from] CheckExecutionError),

  #[error("failed to write report: {0}")]
  Report(#[from] std::io::Error),
}

/// Failures that stop the whole batch before any repository is evaluated.
#[derive(Debug, Error)]
pub enum BatchError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Host(#[from] HostError),
}
