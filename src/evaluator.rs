use std::fmt::Display;
use std::path::Path;

use log::*;

use crate::config::EvalConfig;
use crate::error::CheckExecutionError;
use crate::github::{RepoId, RepositoryHost};
use crate::repo_scoring::checks::{count_lines, dir_exists, file_exists, folder_structure_ok, no_secrets_found};
use crate::repo_scoring::commit_cutoff::{commits_within_cutoff, count_commits, dominant_language};
use crate::repo_scoring::tooling::{lint_passes, tests_pass};
use crate::repo_scoring::{self as scoring, CheckResult, CheckSet, EvaluationReport, ReportBuilder};

/// A boolean check that could not run counts as failed.
fn boolean_outcome<E: Display>(name: &str, result: Result<bool, E>) -> CheckResult {
  match result {
    Ok(passed) => CheckResult::boolean(name, passed),
    Err(e) => {
      warn!("Check «{}» could not run: {}", name, e);
      CheckResult::Boolean {
        name: name.to_string(),
        passed: false,
        note: Some(e.to_string()),
      }
    }
  }
}

/// A metric or informational check that could not run is recorded as
/// unknown and left out of the score.
fn unknown_on_error<E: Display>(name: &str, result: Result<CheckResult, E>) -> CheckResult {
  result.unwrap_or_else(|e| {
    warn!("Check «{}» could not run: {}", name, e);
    CheckResult::Unknown {
      name: name.to_string(),
      reason: e.to_string(),
    }
  })
}

/// Runs the configured checks against one working tree.
pub struct Evaluator<'a> {
  config: &'a EvalConfig,
  host: &'a dyn RepositoryHost,
}

impl<'a> Evaluator<'a> {
  pub fn new(config: &'a EvalConfig, host: &'a dyn RepositoryHost) -> Self {
    Evaluator { config, host }
  }

  /// Every enabled check runs even if an earlier one failed to execute. The
  /// only error returned is a working tree that is not there at all.
  pub async fn evaluate(
    &self,
    repo: &RepoId,
    root: &Path,
  ) -> Result<EvaluationReport, CheckExecutionError> {
    if !root.is_dir() {
      return Err(CheckExecutionError::MissingWorkingTree(root.to_path_buf()));
    }

    let enabled = self.config.checks;
    let timeout = self.config.timeouts.process;
    let mut report = ReportBuilder::new(repo.to_string());

    if enabled.contains(CheckSet::LANGUAGE) {
      let language = self
        .host
        .languages(repo)
        .await
        .map(|languages| CheckResult::info(scoring::LANGUAGE, dominant_language(&languages)));
      report.record(unknown_on_error(scoring::LANGUAGE, language));
    }

    if enabled.contains(CheckSet::REQUIRED_FILES) {
      for file in &self.config.required_files {
        report.record(CheckResult::boolean(
          format!("{} exists", file),
          file_exists(root, file),
        ));
      }
      for dir in &self.config.required_dirs {
        report.record(CheckResult::boolean(
          format!("{}/ exists", dir.trim_end_matches('/')),
          dir_exists(root, dir),
        ));
      }
    }

    if enabled.contains(CheckSet::LOC) {
      let loc = count_lines(root);
      report.record(CheckResult::metric(scoring::TOTAL_LOC, loc.lines, "lines"));
      report.record(CheckResult::metric(
        scoring::SKIPPED_FILES,
        loc.skipped_files,
        "files",
      ));
    }

    if enabled.contains(CheckSet::FOLDER_STRUCTURE) {
      report.record(CheckResult::boolean(
        scoring::FOLDER_STRUCTURE,
        folder_structure_ok(root, &self.config.layout),
      ));
    }

    if enabled.contains(CheckSet::SECRETS) {
      report.record(boolean_outcome(
        scoring::NO_SECRETS,
        no_secrets_found(root, &self.config.secret_markers),
      ));
    }

    if enabled.contains(CheckSet::COMMIT_COUNT) {
      let commits = count_commits(self.host, repo)
        .await
        .map(|count| CheckResult::metric(scoring::TOTAL_COMMITS, count, "commits"));
      report.record(unknown_on_error(scoring::TOTAL_COMMITS, commits));
    }

    if enabled.contains(CheckSet::CUTOFF) {
      let within = commits_within_cutoff(self.host, repo, &self.config.cutoff).await;
      report.record(boolean_outcome(scoring::COMMITS_BEFORE_CUTOFF, within));
    }

    if enabled.contains(CheckSet::LINT) {
      let lint = lint_passes(root, &self.config.lint, timeout).await;
      report.record(boolean_outcome(scoring::LINT, lint));
    }

    if enabled.contains(CheckSet::TESTS) {
      let tests = tests_pass(root, &self.config.tests, timeout).await;
      report.record(boolean_outcome(scoring::TESTS, tests));
    }

    Ok(report.finish())
  }
}
