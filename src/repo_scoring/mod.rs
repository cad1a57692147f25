use bitflags::bitflags;

pub mod checks;
pub mod commit_cutoff;
pub mod tooling;

pub const LANGUAGE: &str = "Programming language";
pub const TOTAL_LOC: &str = "Total LOC";
pub const SKIPPED_FILES: &str = "Undecodable files skipped";
pub const FOLDER_STRUCTURE: &str = "Folder structure is correct";
pub const NO_SECRETS: &str = "No secrets found";
pub const TOTAL_COMMITS: &str = "Total commits";
pub const COMMITS_BEFORE_CUTOFF: &str = "No commits after cutoff";
pub const LINT: &str = "Lint passes";
pub const TESTS: &str = "Tests pass";

bitflags! {
  /// Which checks an evaluation runs.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct CheckSet: u16 {
    const LANGUAGE = 0b0000_0001;
    const REQUIRED_FILES = 0b0000_0010;
    const LOC = 0b0000_0100;
    const FOLDER_STRUCTURE = 0b0000_1000;
    const SECRETS = 0b0001_0000;
    const COMMIT_COUNT = 0b0010_0000;
    const CUTOFF = 0b0100_0000;
    const LINT = 0b1000_0000;
    const TESTS = 0b1_0000_0000;
    const COMMITS = Self::COMMIT_COUNT.bits() | Self::CUTOFF.bits();
  }
}

impl Default for CheckSet {
  fn default() -> Self {
    CheckSet::all()
  }
}

/// The outcome of one named check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
  /// Pass/fail, counted towards the score. `note` explains a failure that
  /// came from the check being unable to run.
  Boolean {
    name: String,
    passed: bool,
    note: Option<String>,
  },
  /// A count, reported with its unit and never scored.
  Metric {
    name: String,
    value: u64,
    unit: &'static str,
  },
  /// Free-form information, never scored.
  Info { name: String, value: Option<String> },
  /// A metric or informational check that could not be run.
  Unknown { name: String, reason: String },
}

impl CheckResult {
  pub fn boolean(name: impl Into<String>, passed: bool) -> Self {
    CheckResult::Boolean {
      name: name.into(),
      passed,
      note: None,
    }
  }

  pub fn metric(name: impl Into<String>, value: u64, unit: &'static str) -> Self {
    CheckResult::Metric {
      name: name.into(),
      value,
      unit,
    }
  }

  pub fn info(name: impl Into<String>, value: Option<String>) -> Self {
    CheckResult::Info {
      name: name.into(),
      value,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      CheckResult::Boolean { name, .. }
      | CheckResult::Metric { name, .. }
      | CheckResult::Info { name, .. }
      | CheckResult::Unknown { name, .. } => name,
    }
  }

  /// `Some(passed)` for checks that take part in scoring.
  pub fn passed(&self) -> Option<bool> {
    match self {
      CheckResult::Boolean { passed, .. } => Some(*passed),
      _ => None,
    }
  }
}

/// Percentage of boolean checks that passed, or `None` if there were no
/// boolean checks at all.
pub fn score(checks: &[CheckResult]) -> Option<f64> {
  let (passed, total) = checks
    .iter()
    .filter_map(CheckResult::passed)
    .fold((0u32, 0u32), |(passed, total), ok| {
      (passed + u32::from(ok), total + 1)
    });

  if total == 0 {
    return None;
  }

  Some(f64::from(passed) / f64::from(total) * 100.0)
}

/// Every check run against one repository, in the order they ran.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
  repository: String,
  checks: Vec<CheckResult>,
  score: Option<f64>,
}

impl EvaluationReport {
  pub fn repository(&self) -> &str {
    &self.repository
  }

  pub fn checks(&self) -> &[CheckResult] {
    &self.checks
  }

  pub fn get(&self, name: &str) -> Option<&CheckResult> {
    self.checks.iter().find(|c| c.name() == name)
  }

  pub fn score(&self) -> Option<f64> {
    self.score
  }
}

/// Collects check results. Recording a name twice replaces the earlier
/// result in place, so each name appears once.
#[derive(Debug)]
pub struct ReportBuilder {
  repository: String,
  checks: Vec<CheckResult>,
}

impl ReportBuilder {
  pub fn new(repository: impl Into<String>) -> Self {
    ReportBuilder {
      repository: repository.into(),
      checks: Vec::new(),
    }
  }

  pub fn record(&mut self, result: CheckResult) -> &mut Self {
    match self.checks.iter_mut().find(|c| c.name() == result.name()) {
      Some(existing) => *existing = result,
      None => self.checks.push(result),
    }
    self
  }

  pub fn finish(self) -> EvaluationReport {
    let score = score(&self.checks);
    EvaluationReport {
      repository: self.repository,
      checks: self.checks,
      score,
    }
  }
}
