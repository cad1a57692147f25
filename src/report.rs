use std::fmt;
use std::io::{self, Write};

use crate::repo_scoring::{CheckResult, EvaluationReport};

impl fmt::Display for CheckResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CheckResult::Boolean { name, passed, note } => {
        write!(f, "{}: {}", name, if *passed { "PASSED" } else { "FAILED" })?;
        if let Some(note) = note {
          write!(f, " ({})", note)?;
        }
        Ok(())
      }
      CheckResult::Metric { name, value, unit } => write!(f, "{}: {} {}", name, value, unit),
      CheckResult::Info { name, value } => {
        write!(f, "{}: {}", name, value.as_deref().unwrap_or("none"))
      }
      CheckResult::Unknown { name, reason } => write!(f, "{}: UNKNOWN ({})", name, reason),
    }
  }
}

impl fmt::Display for EvaluationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Results for repository: {}", self.repository())?;
    for check in self.checks() {
      writeln!(f, "{}", check)?;
    }
    match self.score() {
      Some(score) => writeln!(f, "Score: {:.1}%", score),
      None => writeln!(f, "Score: N/A"),
    }
  }
}

/// Writes one report followed by a blank line and flushes, so output
/// appears as each repository completes.
pub fn write_report<W: Write + ?Sized>(out: &mut W, report: &EvaluationReport) -> io::Result<()> {
  writeln!(out, "{}", report)?;
  out.flush()
}
