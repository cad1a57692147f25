#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use hackathon_eval::config::EvalConfig;
use hackathon_eval::error::{FetchError, HostError};
use hackathon_eval::fetch::{Fetcher, WorkingTree};
use hackathon_eval::github::{CommitInfo, OrgAdmin, RemoteRepository, RepoId, RepositoryHost};
use hackathon_eval::repo_scoring::commit_cutoff::CutoffPolicy;
use hackathon_eval::repo_scoring::CheckSet;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn cutoff_instant() -> DateTime<FixedOffset> {
  FixedOffset::east_opt(5 * 3600 + 30 * 60)
    .unwrap()
    .with_ymd_and_hms(2024, 10, 19, 9, 0, 0)
    .unwrap()
}

pub fn policy() -> CutoffPolicy {
  CutoffPolicy::new(cutoff_instant())
}

/// A commit authored `hours` relative to the cutoff.
pub fn commit_at(sha: &str, hours: i64) -> CommitInfo {
  CommitInfo {
    sha: sha.to_string(),
    author: Some("octocat".to_string()),
    authored_at: Some(cutoff_instant().with_timezone(&Utc) + Duration::hours(hours)),
    message: format!("commit {}", sha),
  }
}

pub fn remote(name: &str) -> RemoteRepository {
  RemoteRepository {
    id: RepoId::new("hackorg", name),
    archived: false,
    fork: false,
    clone_url: Some(format!("https://github.com/hackorg/{}.git", name)),
  }
}

pub fn write_file(root: &Path, relative: &str, contents: &[u8]) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, contents).unwrap();
}

/// A tree that satisfies the default layout and required files.
pub fn populate_submission(root: &Path) {
  write_file(root, "README.md", b"# Team\n\nOur project.\n");
  write_file(root, "code/main.py", b"print('hi')\n");
  fs::create_dir_all(root.join("artifacts/demo")).unwrap();
}

/// Config with the external tool checks turned off.
pub fn offline_config(org: &str) -> EvalConfig {
  let mut config = EvalConfig::new(org, policy());
  config.checks = CheckSet::all() - CheckSet::LINT - CheckSet::TESTS;
  config
}

/// In-memory stand-in for GitHub.
#[derive(Default)]
pub struct FakeHost {
  pub org: String,
  pub repos: Vec<RemoteRepository>,
  pub commits: Vec<CommitInfo>,
  pub languages: HashMap<String, u64>,
  pub fail_languages: bool,
  pub inspected: Arc<AtomicUsize>,
  pub fail_archive: Vec<String>,
  pub archived: Mutex<Vec<String>>,
  pub invited: Mutex<Vec<String>>,
  pub created_repos: Mutex<Vec<String>>,
  pub fail_team: Vec<String>,
  pub users: HashMap<String, String>,
  pub memberships: Mutex<Vec<(String, String)>>,
}

impl FakeHost {
  pub fn new(org: &str) -> Self {
    FakeHost {
      org: org.to_string(),
      ..Default::default()
    }
  }

  pub fn inspected(&self) -> usize {
    self.inspected.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl RepositoryHost for FakeHost {
  async fn organization_exists(&self, org: &str) -> Result<bool, HostError> {
    Ok(org == self.org)
  }

  async fn list_org_repositories(&self, _org: &str) -> Result<Vec<RemoteRepository>, HostError> {
    Ok(self.repos.clone())
  }

  async fn languages(&self, _repo: &RepoId) -> Result<HashMap<String, u64>, HostError> {
    if self.fail_languages {
      return Err(HostError::UserNotFound("languages unavailable".to_string()));
    }
    Ok(self.languages.clone())
  }

  fn commits<'a>(&'a self, _repo: &'a RepoId) -> BoxStream<'a, Result<CommitInfo, HostError>> {
    let inspected = Arc::clone(&self.inspected);
    stream::iter(self.commits.clone())
      .inspect(move |_| {
        inspected.fetch_add(1, Ordering::SeqCst);
      })
      .map(Ok)
      .boxed()
  }
}

#[async_trait]
impl OrgAdmin for FakeHost {
  async fn archive_repository(&self, repo: &RepoId) -> Result<(), HostError> {
    if self.fail_archive.contains(&repo.name) {
      return Err(HostError::UserNotFound(repo.name.clone()));
    }
    self.archived.lock().unwrap().push(repo.name.clone());
    Ok(())
  }

  async fn invite_by_email(&self, _org: &str, email: &str) -> Result<(), HostError> {
    if !email.contains('@') {
      return Err(HostError::UserNotFound(email.to_string()));
    }
    self.invited.lock().unwrap().push(email.to_string());
    Ok(())
  }

  async fn create_from_template(&self, _org: &str, _template: &str, name: &str) -> Result<(), HostError> {
    self.created_repos.lock().unwrap().push(name.to_string());
    Ok(())
  }

  async fn create_team(&self, _org: &str, name: &str) -> Result<String, HostError> {
    if self.fail_team.iter().any(|t| t == name) {
      return Err(HostError::UserNotFound(name.to_string()));
    }
    Ok(name.to_string())
  }

  async fn find_user_by_email(&self, email: &str) -> Result<String, HostError> {
    self
      .users
      .get(email)
      .cloned()
      .ok_or_else(|| HostError::UserNotFound(email.to_string()))
  }

  async fn add_team_member(&self, _org: &str, team_slug: &str, login: &str) -> Result<(), HostError> {
    self
      .memberships
      .lock()
      .unwrap()
      .push((team_slug.to_string(), login.to_string()));
    Ok(())
  }
}

/// Builds working trees under `base` without any network access.
pub struct DirFetcher {
  pub base: PathBuf,
  pub fail: Vec<String>,
  /// Hand back a root that does not exist, so evaluation fails.
  pub broken_root: Vec<String>,
  pub scratches: Mutex<Vec<PathBuf>>,
}

impl DirFetcher {
  pub fn new(base: &Path) -> Self {
    DirFetcher {
      base: base.to_path_buf(),
      fail: Vec::new(),
      broken_root: Vec::new(),
      scratches: Mutex::new(Vec::new()),
    }
  }

  pub fn scratches(&self) -> Vec<PathBuf> {
    self.scratches.lock().unwrap().clone()
  }
}

#[async_trait]
impl Fetcher for DirFetcher {
  async fn fetch(&self, repo: &RemoteRepository) -> Result<WorkingTree, FetchError> {
    if self.fail.contains(&repo.id.name) {
      return Err(FetchError::NotFound(repo.id.to_string()));
    }

    let scratch = self.base.join(&repo.id.name);
    populate_submission(&scratch);
    self.scratches.lock().unwrap().push(scratch.clone());

    let root = if self.broken_root.contains(&repo.id.name) {
      scratch.join("missing")
    } else {
      scratch.clone()
    };

    Ok(WorkingTree::new(scratch, root))
  }
}

/// A local HTTP endpoint that answers every request with the same response.
pub struct CannedServer {
  pub base_url: String,
  requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
  pub async fn start(status: u16, body: impl Into<Vec<u8>>) -> Self {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
          match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
          }
        }

        let request_line = String::from_utf8_lossy(&head)
          .lines()
          .next()
          .unwrap_or_default()
          .to_string();
        seen.lock().unwrap().push(request_line);

        let header = format!(
          "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
          status,
          body.len()
        );
        let _ = socket.write_all(header.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
      }
    });

    CannedServer {
      base_url: format!("http://{}", addr),
      requests,
    }
  }

  /// Request lines seen so far, e.g. `GET /repos/o/r/tarball HTTP/1.1`.
  pub fn requests(&self) -> Vec<String> {
    self.requests.lock().unwrap().clone()
  }
}
