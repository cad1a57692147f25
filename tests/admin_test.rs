mod common;

use std::path::Path;

use common::{remote, FakeHost};
use hackathon_eval::admin::roster::{parse_emails, parse_team_members, parse_teams, sanitize_team_name};
use hackathon_eval::admin::{self, AdminSummary};
use hackathon_eval::error::{BatchError, ConfigError};

#[test]
fn test_sanitize_team_name() {
  assert_eq!(sanitize_team_name("Team Rocket"), "team-rocket");
  assert_eq!(sanitize_team_name("  The_Null  Pointers!! "), "the-null-pointers");
  assert_eq!(sanitize_team_name("404: Sleep Not Found"), "404-sleep-not-found");
  assert_eq!(sanitize_team_name("***"), "");
}

#[test]
fn test_parse_rosters() {
  let path = Path::new("roster.csv");

  let emails = parse_emails("name,email\nAda,ada@example.com\nLinus, linus@example.com \n".as_bytes(), path).unwrap();
  assert_eq!(emails, vec!["ada@example.com", "linus@example.com"]);

  let teams = parse_teams("team\nTeam Rocket\nByte Me\n".as_bytes(), path).unwrap();
  assert_eq!(teams, vec!["Team Rocket", "Byte Me"]);
}

#[test]
fn test_group_team_members_in_first_seen_order() {
  let csv = "team,email\n\
             Byte Me,b1@example.com\n\
             Team Rocket,r1@example.com\n\
             Byte Me,b2@example.com\n";
  let teams = parse_team_members(csv.as_bytes(), Path::new("teams.csv")).unwrap();

  assert_eq!(teams.len(), 2);
  assert_eq!(teams[0].team, "Byte Me");
  assert_eq!(teams[0].emails, vec!["b1@example.com", "b2@example.com"]);
  assert_eq!(teams[1].team, "Team Rocket");
  assert_eq!(teams[1].emails, vec!["r1@example.com"]);
}

#[test]
fn test_missing_column_is_a_config_error() {
  let result = parse_emails("name\nAda\n".as_bytes(), Path::new("emails.csv"));
  assert!(matches!(result, Err(ConfigError::Roster { .. })));
}

#[tokio::test]
async fn test_archive_skips_archived_and_continues_past_failures() {
  let mut host = FakeHost::new("hackorg");
  let mut already = remote("old");
  already.archived = true;
  host.repos = vec![remote("alpha"), already, remote("beta"), remote("gamma")];
  host.fail_archive = vec!["beta".to_string()];

  let summary = admin::archive_org_repos(&host, "hackorg").await.unwrap();

  assert_eq!(
    summary,
    AdminSummary {
      succeeded: 2,
      failed: 1,
      unchanged: 1
    }
  );
  assert_eq!(*host.archived.lock().unwrap(), vec!["alpha", "gamma"]);
}

#[tokio::test]
async fn test_unknown_org_is_fatal() {
  let host = FakeHost::new("hackorg");
  let result = admin::archive_org_repos(&host, "elsewhere").await;
  assert!(matches!(
    result,
    Err(BatchError::Config(ConfigError::OrganizationNotFound(_)))
  ));
}

#[tokio::test]
async fn test_invite_members() {
  let host = FakeHost::new("hackorg");
  let emails = vec!["ada@example.com".to_string(), "not-an-email".to_string()];

  let summary = admin::invite_members(&host, "hackorg", &emails).await.unwrap();

  assert_eq!(summary.succeeded, 1);
  assert_eq!(summary.failed, 1);
  assert_eq!(*host.invited.lock().unwrap(), vec!["ada@example.com"]);
}

#[tokio::test]
async fn test_create_team_repos_uses_sanitized_names() {
  let host = FakeHost::new("hackorg");
  let teams = vec!["Team Rocket".to_string(), "Byte Me!".to_string()];

  let summary = admin::create_team_repos(&host, "hackorg", "hackathon-template", &teams)
    .await
    .unwrap();

  assert_eq!(summary.succeeded, 2);
  assert_eq!(*host.created_repos.lock().unwrap(), vec!["team-rocket", "byte-me"]);
}

#[tokio::test]
async fn test_create_teams_adds_known_users() {
  let mut host = FakeHost::new("hackorg");
  host.users.insert("r1@example.com".to_string(), "rocket-one".to_string());
  host.users.insert("b1@example.com".to_string(), "byte-one".to_string());
  host.fail_team = vec!["broken".to_string()];

  let csv = "team,email\n\
             Team Rocket,r1@example.com\n\
             Team Rocket,ghost@example.com\n\
             Broken,b1@example.com\n";
  let teams = parse_team_members(csv.as_bytes(), Path::new("teams.csv")).unwrap();

  let summary = admin::create_teams(&host, "hackorg", &teams).await.unwrap();

  assert_eq!(summary.succeeded, 1);
  assert_eq!(summary.failed, 2);
  assert_eq!(
    *host.memberships.lock().unwrap(),
    vec![("team-rocket".to_string(), "rocket-one".to_string())]
  );
}
