use std::io::Write;

use log::*;

use crate::config::EvalConfig;
use crate::error::{BatchError, ConfigError, EvaluationError};
use crate::evaluator::Evaluator;
use crate::fetch::Fetcher;
use crate::github::{RemoteRepository, RepositoryHost};
use crate::repo_scoring::EvaluationReport;
use crate::report::write_report;

/// How a batch went.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
  pub evaluated: u32,
  pub failed: u32,
  pub skipped: u32,
}

/// Drives fetch, evaluate, score and report for each repository in turn.
pub struct Orchestrator<'a> {
  config: &'a EvalConfig,
  host: &'a dyn RepositoryHost,
  fetcher: &'a dyn Fetcher,
}

impl<'a> Orchestrator<'a> {
  pub fn new(config: &'a EvalConfig, host: &'a dyn RepositoryHost, fetcher: &'a dyn Fetcher) -> Self {
    Orchestrator {
      config,
      host,
      fetcher,
    }
  }

  fn should_skip_repo(&self, repo: &RemoteRepository) -> bool {
    // Skip over archived repositories, unless asked to include them.
    if repo.archived && !self.config.include_archived {
      return true;
    }
    // Skip over forks, unless asked to include them.
    if repo.fork && !self.config.include_forks {
      return true;
    }

    !self.config.only.is_empty() && !self.config.only.iter().any(|n| *n == repo.id.name)
  }

  /// Lists the organization's repositories. A missing organization is
  /// fatal.
  pub async fn discover(&self) -> Result<Vec<RemoteRepository>, BatchError> {
    let org = &self.config.org;
    if !self.host.organization_exists(org).await? {
      return Err(ConfigError::OrganizationNotFound(org.clone()).into());
    }

    let repos = self.host.list_org_repositories(org).await?;
    debug!("Got repos: {}", repos.len());
    Ok(repos)
  }

  /// Evaluates a single repository and writes its report. The working tree
  /// is removed before this returns, whether or not evaluation succeeded.
  pub async fn evaluate_one<W: Write>(
    &self,
    repo: &RemoteRepository,
    out: &mut W,
  ) -> Result<EvaluationReport, EvaluationError> {
    let tree = self.fetcher.fetch(repo).await?;
    let evaluator = Evaluator::new(self.config, self.host);
    let report = evaluator.evaluate(&repo.id, tree.root()).await?;
    write_report(out, &report)?;
    Ok(report)
  }

  /// Processes `repos` in order. A repository that fails is logged and the
  /// batch carries on with the next one.
  pub async fn run<W: Write>(&self, repos: &[RemoteRepository], out: &mut W) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for repo in repos {
      if self.should_skip_repo(repo) {
        debug!("Skipping {}", repo.id);
        summary.skipped += 1;
        continue;
      }

      info!("Processing: {}", repo.id);
      match self.evaluate_one(repo, out).await {
        Ok(report) => {
          debug!("Finished {} with score {:?}", repo.id, report.score());
          summary.evaluated += 1;
        }
        Err(e) => {
          error!("Failed to evaluate {}: {}", repo.id, e);
          summary.failed += 1;
        }
      }
    }

    info!(
      "Evaluated {} repositories, {} failed, {} skipped",
      summary.evaluated, summary.failed, summary.skipped
    );

    summary
  }
}
