use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use futures::{StreamExt, TryStreamExt};
use log::*;

use crate::error::HostError;
use crate::github::{CommitInfo, RepoId, RepositoryHost};

/// The instant after which commits no longer count as part of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
  cutoff: DateTime<FixedOffset>,
}

impl CutoffPolicy {
  pub fn new(cutoff: DateTime<FixedOffset>) -> Self {
    CutoffPolicy { cutoff }
  }

  /// Parses an RFC 3339 timestamp such as `2024-10-19T09:00:00+05:30`.
  pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(CutoffPolicy::new)
  }

  pub fn cutoff(&self) -> DateTime<FixedOffset> {
    self.cutoff
  }

  /// A commit violates the policy when it was authored strictly after the
  /// cutoff, compared in the cutoff's own timezone.
  pub fn is_violated_by(&self, authored_at: &DateTime<Utc>) -> bool {
    authored_at.with_timezone(&self.cutoff.timezone()) > self.cutoff
  }
}

/// Walks commits newest first and stops at the first one authored after the
/// cutoff. Returns `true` when no such commit exists.
pub async fn commits_within_cutoff(
  host: &dyn RepositoryHost,
  repo: &RepoId,
  policy: &CutoffPolicy,
) -> Result<bool, HostError> {
  let mut commits = host.commits(repo);

  while let Some(commit) = commits.next().await {
    let commit = commit?;
    let Some(authored_at) = commit.authored_at else {
      debug!("Commit {} has no author date, ignoring it", commit.sha);
      continue;
    };

    if policy.is_violated_by(&authored_at) {
      log_late_commit(&commit, policy);
      return Ok(false);
    }
  }

  Ok(true)
}

fn log_late_commit(commit: &CommitInfo, policy: &CutoffPolicy) {
  let local = commit
    .authored_at
    .map(|at| at.with_timezone(&policy.cutoff.timezone()).to_rfc3339())
    .unwrap_or_default();

  warn!(
    "Commit {} by {} at {} is after the cutoff {}: {}",
    commit.sha,
    commit.author.as_deref().unwrap_or("unknown"),
    local,
    policy.cutoff.to_rfc3339(),
    commit.message.lines().next().unwrap_or_default()
  );
}

/// Total commits reachable from the default branch.
pub async fn count_commits(host: &dyn RepositoryHost, repo: &RepoId) -> Result<u64, HostError> {
  host
    .commits(repo)
    .try_fold(0u64, |count, _| async move { Ok(count + 1) })
    .await
}

/// The language with the most bytes, if the host knows of any.
pub fn dominant_language(languages: &HashMap<String, u64>) -> Option<String> {
  languages
    .iter()
    .max_by(|(a_name, a_bytes), (b_name, b_bytes)| {
      // Ties go to the alphabetically first name so results are stable.
      a_bytes.cmp(b_bytes).then_with(|| b_name.cmp(a_name))
    })
    .map(|(name, _)| name.clone())
}
