use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::*;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::config::{Credentials, FetchStrategy, Timeouts, TOKEN_VAR};
use crate::error::{FetchError, TimeoutError};
use crate::github::RemoteRepository;

const API_BASE: &str = "https://api.github.com";
/// Carries the token to the credential helper of a single `git clone`.
const GIT_TOKEN_VAR: &str = "HACKATHON_EVAL_GIT_TOKEN";
/// Answers git's credential prompt from the environment, so the token never
/// lands in the clone URL or the cloned `.git/config`.
const CREDENTIAL_HELPER: &str =
  "credential.helper=!f() { echo username=x-access-token; echo \"password=$HACKATHON_EVAL_GIT_TOKEN\"; }; f";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A local copy of a repository. The scratch directory holding it is removed
/// when this value is dropped, whichever way evaluation ended.
#[derive(Debug)]
pub struct WorkingTree {
  scratch: PathBuf,
  root: PathBuf,
}

impl WorkingTree {
  /// Takes ownership of `scratch`; `root` must live somewhere beneath it.
  pub fn new(scratch: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
    WorkingTree {
      scratch: scratch.into(),
      root: root.into(),
    }
  }

  fn rooted_at(mut self, root: PathBuf) -> Self {
    self.root = root;
    self
  }

  /// The top of the repository's files.
  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl Drop for WorkingTree {
  fn drop(&mut self) {
    match remove_tree(&self.scratch) {
      Ok(()) => debug!("Removed {}", self.scratch.display()),
      Err(e) => error!("Failed to remove {}: {}", self.scratch.display(), e),
    }
  }
}

fn make_writable(path: &Path) {
  for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
    if let Ok(meta) = entry.metadata() {
      let mut perms = meta.permissions();
      if perms.readonly() {
        perms.set_readonly(false);
        let _ = fs::set_permissions(entry.path(), perms);
      }
    }
  }
}

/// Recursively removes `path`. Git marks some of its metadata read-only, so
/// a failed first attempt clears read-only flags and tries again.
pub fn remove_tree(path: &Path) -> io::Result<()> {
  if fs::symlink_metadata(path).is_err() {
    return Ok(());
  }

  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) => {
      debug!("Retrying removal of {} after {}", path.display(), e);
      make_writable(path);
      fs::remove_dir_all(path)
    }
  }
}

/// Produces working trees for remote repositories.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, repo: &RemoteRepository) -> Result<WorkingTree, FetchError>;
}

/// Fetches from GitHub using the configured strategy.
#[derive(Debug)]
pub struct RepositoryFetcher {
  strategy: FetchStrategy,
  work_dir: PathBuf,
  credentials: Credentials,
  timeouts: Timeouts,
  http: reqwest::Client,
  api_base: String,
}

impl RepositoryFetcher {
  pub fn new(
    strategy: FetchStrategy,
    work_dir: impl Into<PathBuf>,
    credentials: Credentials,
    timeouts: Timeouts,
  ) -> Result<Self, FetchError> {
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    Ok(RepositoryFetcher {
      strategy,
      work_dir: work_dir.into(),
      credentials,
      timeouts,
      http,
      api_base: API_BASE.to_string(),
    })
  }

  /// Points archive downloads at another API root, such as GitHub
  /// Enterprise.
  pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
    self.api_base = api_base.into().trim_end_matches('/').to_string();
    self
  }

  /// Clears anything left at `path` by an earlier run and makes sure its
  /// parent exists.
  fn prepare(&self, path: &Path) -> Result<(), FetchError> {
    remove_tree(path).map_err(|e| FetchError::io(path, e))?;
    fs::create_dir_all(&self.work_dir).map_err(|e| FetchError::io(&self.work_dir, e))
  }

  fn redact(&self, text: &str) -> String {
    text.replace(self.credentials.token(), "***")
  }

  /// The token reaches git only through the credential helper's
  /// environment, never through its arguments.
  fn clone_command(&self, url: &str, target: &Path) -> Command {
    let mut command = Command::new("git");
    // An empty helper first clears any helpers from the user's git config.
    command
      .args(["-c", "credential.helper="])
      .arg("-c")
      .arg(CREDENTIAL_HELPER)
      .arg("clone")
      .arg("--quiet")
      .arg(url)
      .arg(target)
      .env_remove(TOKEN_VAR)
      .env(GIT_TOKEN_VAR, self.credentials.token())
      .env("GIT_TERMINAL_PROMPT", "0")
      .kill_on_drop(true);
    command
  }

  async fn clone_repo(&self, repo: &RemoteRepository) -> Result<WorkingTree, FetchError> {
    let url = repo
      .clone_url
      .as_deref()
      .ok_or_else(|| FetchError::MissingCloneUrl(repo.id.to_string()))?;

    let target = self.work_dir.join(&repo.id.name);
    self.prepare(&target)?;
    // Created before cloning so a partial clone is cleaned up too.
    let tree = WorkingTree::new(&target, &target);

    info!("Cloning {} into {}", url, target.display());
    let clone = self.clone_command(url, &target).output();

    let output = bounded(self.timeouts.process, "git clone", clone)
      .await?
      .map_err(|e| FetchError::io(&target, e))?;

    if output.status.success() {
      return Ok(tree);
    }

    let stderr = self.redact(String::from_utf8_lossy(&output.stderr).trim());
    if is_repo_not_found(&stderr) {
      return Err(FetchError::NotFound(repo.id.to_string()));
    }

    Err(FetchError::Clone {
      repo: repo.id.to_string(),
      stderr,
    })
  }

  async fn download_archive(&self, repo: &RemoteRepository) -> Result<WorkingTree, FetchError> {
    let scratch = self.work_dir.join(format!("{}-archive", repo.id.name));
    self.prepare(&scratch)?;
    fs::create_dir_all(&scratch).map_err(|e| FetchError::io(&scratch, e))?;
    let tree = WorkingTree::new(&scratch, &scratch);

    let url = format!("{}/repos/{}/{}/tarball", self.api_base, repo.id.owner, repo.id.name);
    info!("Downloading {}", url);

    let request = self
      .http
      .get(&url)
      .bearer_auth(self.credentials.token())
      .header(reqwest::header::ACCEPT, "application/vnd.github+json")
      .send();
    let response = bounded(self.timeouts.network, "archive download", request).await??;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
      return Err(FetchError::NotFound(repo.id.to_string()));
    }
    if !status.is_success() {
      return Err(FetchError::Download {
        repo: repo.id.to_string(),
        status: status.as_u16(),
      });
    }

    let bytes = bounded(self.timeouts.network, "archive download", response.bytes()).await??;

    let archive_path = scratch.join("snapshot.tar.gz");
    fs::write(&archive_path, &bytes).map_err(|e| FetchError::io(&archive_path, e))?;

    let extract_dir = scratch.join("tree");
    unpack_archive(&archive_path, &extract_dir)?;

    let root = top_level_dir(&extract_dir)?
      .ok_or_else(|| FetchError::InvalidArchive(repo.id.to_string()))?;

    Ok(tree.rooted_at(root))
  }
}

#[async_trait]
impl Fetcher for RepositoryFetcher {
  async fn fetch(&self, repo: &RemoteRepository) -> Result<WorkingTree, FetchError> {
    match self.strategy {
      FetchStrategy::Clone => self.clone_repo(repo).await,
      FetchStrategy::Archive => self.download_archive(repo).await,
    }
  }
}

async fn bounded<F: std::future::Future>(
  limit: Duration,
  operation: &str,
  fut: F,
) -> Result<F::Output, TimeoutError> {
  tokio::time::timeout(limit, fut)
    .await
    .map_err(|_| TimeoutError::new(operation, limit))
}

fn is_repo_not_found(stderr: &str) -> bool {
  let stderr = stderr.to_lowercase();
  stderr.contains("not found")
    || stderr.contains("does not exist")
    || stderr.contains("does not appear to be a git repository")
}

/// Unpacks a gzipped tarball into `dest`.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
  let file = File::open(archive_path).map_err(|e| FetchError::io(archive_path, e))?;
  fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

  tar::Archive::new(GzDecoder::new(file))
    .unpack(dest)
    .map_err(|e| FetchError::io(archive_path, e))
}

/// The first directory directly inside `dir`, if there is one.
pub fn top_level_dir(dir: &Path) -> Result<Option<PathBuf>, FetchError> {
  let entries = fs::read_dir(dir).map_err(|e| FetchError::io(dir, e))?;

  for entry in entries {
    let entry = entry.map_err(|e| FetchError::io(dir, e))?;
    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
      return Ok(Some(entry.path()));
    }
  }

  Ok(None)
}

#[cfg(test)]
mod tests {
  use std::ffi::OsStr;

  use super::*;

  #[test]
  fn test_clone_command_keeps_token_out_of_arguments() {
    let fetcher = RepositoryFetcher::new(
      FetchStrategy::Clone,
      "work",
      Credentials::new("ghp_secret"),
      Timeouts::default(),
    )
    .unwrap();

    let command = fetcher.clone_command("https://github.com/acme/widgets.git", Path::new("work/widgets"));
    let command = command.as_std();

    let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
    assert!(args.contains(&"https://github.com/acme/widgets.git".to_string()));
    assert!(args.iter().all(|a| !a.contains("ghp_secret")));

    let envs: Vec<_> = command.get_envs().collect();
    assert!(envs.contains(&(OsStr::new(GIT_TOKEN_VAR), Some(OsStr::new("ghp_secret")))));
    assert!(envs.contains(&(OsStr::new(TOKEN_VAR), None)));
  }

  #[test]
  fn test_repo_not_found() {
    assert!(is_repo_not_found("remote: Repository not found."));
    assert!(is_repo_not_found(
      "fatal: '/tmp/nope' does not appear to be a git repository"
    ));
    assert!(!is_repo_not_found("fatal: unable to access"));
  }
}
