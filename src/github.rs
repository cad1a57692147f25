use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::*;
use octocrab::models;
use serde::Deserialize;
use serde_json::json;

use crate::config::Credentials;
use crate::error::{ConfigError, HostError, TimeoutError};

const PAGE_SIZE: u8 = 100;

/// Identifies a repository on the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
  pub owner: String,
  pub name: String,
}

impl RepoId {
  pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
    RepoId {
      owner: owner.into(),
      name: name.into(),
    }
  }
}

impl fmt::Display for RepoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.name)
  }
}

/// The parts of a remote repository listing that the evaluator cares about.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
  pub id: RepoId,
  pub archived: bool,
  pub fork: bool,
  pub clone_url: Option<String>,
}

impl RemoteRepository {
  /// Build from an API model. Repositories listed under an organization
  /// always carry an owner, but fall back to the organization just in case.
  pub fn from_model(repo: &models::Repository, org: &str) -> Self {
    let owner = repo
      .owner
      .as_ref()
      .map(|o| o.login.clone())
      .unwrap_or_else(|| org.to_string());

    RemoteRepository {
      id: RepoId::new(owner, repo.name.clone()),
      archived: repo.archived.unwrap_or(false),
      fork: repo.fork.unwrap_or(false),
      clone_url: repo.clone_url.as_ref().map(|u| u.to_string()),
    }
  }
}

/// A single commit as seen through the metadata API.
#[derive(Debug, Clone)]
pub struct CommitInfo {
  pub sha: String,
  pub author: Option<String>,
  pub authored_at: Option<DateTime<Utc>>,
  pub message: String,
}

impl From<models::repos::RepoCommit> for CommitInfo {
  fn from(commit: models::repos::RepoCommit) -> Self {
    CommitInfo {
      sha: commit.sha,
      author: commit.author.map(|a| a.login),
      authored_at: commit.commit.author.and_then(|a| a.date),
      message: commit.commit.message,
    }
  }
}

/// Read access to the remote repository metadata API.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
  /// Returns `false` if the organization does not exist.
  async fn organization_exists(&self, org: &str) -> Result<bool, HostError>;

  async fn list_org_repositories(&self, org: &str) -> Result<Vec<RemoteRepository>, HostError>;

  /// Language name to number of bytes written in it.
  async fn languages(&self, repo: &RepoId) -> Result<HashMap<String, u64>, HostError>;

  /// Commits reachable from the default branch, newest first. The stream is
  /// lazy: pages are only requested as the consumer asks for more.
  fn commits<'a>(&'a self, repo: &'a RepoId) -> BoxStream<'a, Result<CommitInfo, HostError>>;
}

/// Write operations used by the organization administration commands.
#[async_trait]
pub trait OrgAdmin: RepositoryHost {
  async fn archive_repository(&self, repo: &RepoId) -> Result<(), HostError>;

  async fn invite_by_email(&self, org: &str, email: &str) -> Result<(), HostError>;

  async fn create_from_template(
    &self,
    org: &str,
    template: &str,
    name: &str,
  ) -> Result<(), HostError>;

  /// Creates a closed team and returns its slug.
  async fn create_team(&self, org: &str, name: &str) -> Result<String, HostError>;

  /// Returns the login of the first user whose profile matches the email.
  async fn find_user_by_email(&self, email: &str) -> Result<String, HostError>;

  async fn add_team_member(&self, org: &str, team_slug: &str, login: &str) -> Result<(), HostError>;
}

/// This function returns a live Octocrab instance.
pub fn octocrab_handle(credentials: &Credentials) -> Result<octocrab::Octocrab, ConfigError> {
  octocrab::Octocrab::builder()
    .personal_token(credentials.token().to_string())
    .build()
    .map_err(ConfigError::Client)
}

/// GitHub implementation of the host traits. Every call is bounded by
/// `timeout`.
#[derive(Debug, Clone)]
pub struct GithubHost {
  gh: octocrab::Octocrab,
  timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CreatedTeam {
  slug: String,
}

impl GithubHost {
  pub fn new(gh: octocrab::Octocrab, timeout: Duration) -> Self {
    GithubHost { gh, timeout }
  }

  async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, HostError>
  where
    F: Future<Output = octocrab::Result<T>>,
  {
    match tokio::time::timeout(self.timeout, call).await {
      Ok(result) => Ok(result?),
      Err(_) => Err(TimeoutError::new(operation, self.timeout).into()),
    }
  }

  async fn commits_page(&self, repo: &RepoId, page: u32) -> Result<Vec<CommitInfo>, HostError> {
    debug!("Fetching commit page {} of {}", page, repo);
    let handler = self.gh.repos(&repo.owner, &repo.name);
    let current_page = self
      .bounded(
        "list commits",
        handler.list_commits().per_page(PAGE_SIZE).page(page).send(),
      )
      .await;

    match current_page {
      Ok(current_page) => Ok(current_page.items.into_iter().map(CommitInfo::from).collect()),
      // GitHub answers 409 Conflict for a repository with no commits at all.
      Err(HostError::Api(e)) if is_status(&e, 409) => {
        debug!("{} is empty", repo);
        Ok(Vec::new())
      }
      Err(e) => Err(e),
    }
  }
}

fn is_status(err: &octocrab::Error, code: u16) -> bool {
  matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == code)
}

fn is_not_found(err: &octocrab::Error) -> bool {
  is_status(err, 404)
}

#[async_trait]
impl RepositoryHost for GithubHost {
  async fn organization_exists(&self, org: &str) -> Result<bool, HostError> {
    match tokio::time::timeout(self.timeout, self.gh.orgs(org).get()).await {
      Ok(Ok(_)) => Ok(true),
      Ok(Err(e)) if is_not_found(&e) => Ok(false),
      Ok(Err(e)) => Err(e.into()),
      Err(_) => Err(TimeoutError::new("get organization", self.timeout).into()),
    }
  }

  async fn list_org_repositories(&self, org: &str) -> Result<Vec<RemoteRepository>, HostError> {
    let orgs_handle = self.gh.orgs(org);

    let mut to_return = Vec::new();
    let mut page_number = 1u32;

    loop {
      let current_page = self
        .bounded(
          "list repositories",
          orgs_handle
            .list_repos()
            .per_page(PAGE_SIZE)
            .page(page_number)
            .send(),
        )
        .await?;

      // Stop looking if we're not getting any more items
      if current_page.items.is_empty() {
        debug!("Finished paging through repositories.");
        break;
      }

      to_return.extend(
        current_page
          .items
          .iter()
          .map(|repo| RemoteRepository::from_model(repo, org)),
      );

      page_number += 1;
    }

    Ok(to_return)
  }

  async fn languages(&self, repo: &RepoId) -> Result<HashMap<String, u64>, HostError> {
    let handler = self.gh.repos(&repo.owner, &repo.name);
    let languages = self
      .bounded("list languages", handler.list_languages())
      .await?;

    Ok(
      languages
        .into_iter()
        .map(|(name, bytes)| (name, u64::try_from(bytes).unwrap_or(0)))
        .collect(),
    )
  }

  fn commits<'a>(&'a self, repo: &'a RepoId) -> BoxStream<'a, Result<CommitInfo, HostError>> {
    stream::try_unfold(Some(1u32), move |page| async move {
      let Some(page) = page else {
        return Ok(None);
      };

      let items = self.commits_page(repo, page).await?;
      let next = if items.len() < usize::from(PAGE_SIZE) {
        None
      } else {
        Some(page + 1)
      };

      let page_stream = stream::iter(items.into_iter().map(Ok::<CommitInfo, HostError>));
      Ok::<_, HostError>(Some((page_stream, next)))
    })
    .try_flatten()
    .boxed()
  }
}

#[async_trait]
impl OrgAdmin for GithubHost {
  async fn archive_repository(&self, repo: &RepoId) -> Result<(), HostError> {
    let route = format!("/repos/{}/{}", repo.owner, repo.name);
    let body = json!({ "archived": true });
    let _: serde_json::Value = self
      .bounded("archive repository", self.gh.patch(route, Some(&body)))
      .await?;
    Ok(())
  }

  async fn invite_by_email(&self, org: &str, email: &str) -> Result<(), HostError> {
    let route = format!("/orgs/{}/invitations", org);
    let body = json!({ "email": email });
    let _: serde_json::Value = self
      .bounded("invite user", self.gh.post(route, Some(&body)))
      .await?;
    Ok(())
  }

  async fn create_from_template(
    &self,
    org: &str,
    template: &str,
    name: &str,
  ) -> Result<(), HostError> {
    let route = format!("/repos/{}/{}/generate", org, template);
    let body = json!({ "owner": org, "name": name, "private": false });
    let _: serde_json::Value = self
      .bounded("create repository from template", self.gh.post(route, Some(&body)))
      .await?;
    Ok(())
  }

  async fn create_team(&self, org: &str, name: &str) -> Result<String, HostError> {
    let route = format!("/orgs/{}/teams", org);
    let body = json!({ "name": name, "privacy": "closed" });
    let team: CreatedTeam = self
      .bounded("create team", self.gh.post(route, Some(&body)))
      .await?;
    Ok(team.slug)
  }

  async fn find_user_by_email(&self, email: &str) -> Result<String, HostError> {
    let query = format!("{} in:email", email);
    let results = self
      .bounded("search users", self.gh.search().users(&query).send())
      .await?;

    results
      .items
      .into_iter()
      .next()
      .map(|author| author.login)
      .ok_or_else(|| HostError::UserNotFound(email.to_string()))
  }

  async fn add_team_member(&self, org: &str, team_slug: &str, login: &str) -> Result<(), HostError> {
    let route = format!("/orgs/{}/teams/{}/memberships/{}", org, team_slug, login);
    let _: serde_json::Value = self
      .bounded("add team membership", self.gh.put(route, None::<&()>))
      .await?;
    Ok(())
  }
}
