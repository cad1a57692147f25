//! CSV rosters that drive the administration commands.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct EmailRow {
  email: String,
}

#[derive(Debug, Deserialize)]
struct TeamRow {
  team: String,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
  team: String,
  email: String,
}

/// A team and the email addresses of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
  pub team: String,
  pub emails: Vec<String>,
}

fn read_rows<T, R>(reader: R, path: &Path) -> Result<Vec<T>, ConfigError>
where
  T: DeserializeOwned,
  R: Read,
{
  csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(reader)
    .deserialize()
    .collect::<Result<Vec<T>, csv::Error>>()
    .map_err(|source| ConfigError::Roster {
      path: path.to_path_buf(),
      source,
    })
}

fn open(path: &Path) -> Result<std::fs::File, ConfigError> {
  std::fs::File::open(path).map_err(|e| ConfigError::Roster {
    path: path.to_path_buf(),
    source: e.into(),
  })
}

pub fn parse_emails<R: Read>(reader: R, path: &Path) -> Result<Vec<String>, ConfigError> {
  let rows: Vec<EmailRow> = read_rows(reader, path)?;
  Ok(rows.into_iter().map(|r| r.email).collect())
}

pub fn parse_teams<R: Read>(reader: R, path: &Path) -> Result<Vec<String>, ConfigError> {
  let rows: Vec<TeamRow> = read_rows(reader, path)?;
  Ok(rows.into_iter().map(|r| r.team).collect())
}

/// Groups members by team, keeping teams in the order they first appear.
pub fn parse_team_members<R: Read>(reader: R, path: &Path) -> Result<Vec<TeamRoster>, ConfigError> {
  let rows: Vec<MemberRow> = read_rows(reader, path)?;
  let mut teams: Vec<TeamRoster> = Vec::new();

  for row in rows {
    match teams.iter_mut().find(|t| t.team == row.team) {
      Some(existing) => existing.emails.push(row.email),
      None => teams.push(TeamRoster {
        team: row.team,
        emails: vec![row.email],
      }),
    }
  }

  Ok(teams)
}

pub fn read_emails(path: &Path) -> Result<Vec<String>, ConfigError> {
  parse_emails(open(path)?, path)
}

pub fn read_teams(path: &Path) -> Result<Vec<String>, ConfigError> {
  parse_teams(open(path)?, path)
}

pub fn read_team_members(path: &Path) -> Result<Vec<TeamRoster>, ConfigError> {
  parse_team_members(open(path)?, path)
}

/// Turns a free-form team name into a kebab-case repository or team name.
pub fn sanitize_team_name(team: &str) -> String {
  static SEPARATORS: OnceLock<Regex> = OnceLock::new();
  let separators = SEPARATORS.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").expect("static pattern"));

  separators
    .replace_all(team, "-")
    .to_lowercase()
    .trim_matches('-')
    .to_string()
}
